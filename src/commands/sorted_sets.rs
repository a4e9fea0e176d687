use bytes::Bytes;

use crate::client::Client;
use crate::commands::strings::SetCondition;
use crate::context::Context;
use crate::frame::Reply;
use crate::pool::Dial;
use crate::request::{cmd, Arg, Request};
use crate::Result;

/// A sorted set member and its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ZSetValue {
    pub member: Bytes,
    pub score: f64,
}

impl ZSetValue {
    pub fn new(member: impl Into<Bytes>, score: f64) -> ZSetValue {
        ZSetValue {
            member: member.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZAddFlags {
    /// `NX` adds new members only, `XX` updates existing ones only.
    pub condition: SetCondition,
    /// `CH`: count updated members in the reply, not just added ones.
    pub changed: bool,
}

impl<D: Dial> Client<D> {
    /// Ref: <https://redis.io/docs/latest/commands/zadd/>
    pub async fn zadd(
        &self,
        ctx: &Context,
        key: &str,
        flags: ZAddFlags,
        values: &[ZSetValue],
    ) -> Result<i64> {
        let mut request = Request::with_capacity(4 + values.len() * 2)
            .arg("zadd")
            .arg(key);
        if let Some(flag) = flags.condition.flag() {
            request.push(flag);
        }
        if flags.changed {
            request.push("CH");
        }
        for value in values {
            request.push(value.score);
            request.push(&value.member);
        }

        self.call_int(ctx, request).await
    }

    /// Returns the new score.
    pub async fn zincr_by(
        &self,
        ctx: &Context,
        key: &str,
        member: impl Into<Arg>,
        by: f64,
    ) -> Result<f64> {
        self.call_float(ctx, cmd("zincrby").arg(key).arg(by).arg(member))
            .await
    }

    /// Members between two ranks, lowest score first, with their scores.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/zrange/>
    pub async fn zrange(&self, ctx: &Context, key: &str, start: i64, stop: i64) -> Result<Vec<ZSetValue>> {
        self.zrange_with_scores(ctx, ranged("zrange", key, start, stop, None))
            .await
    }

    pub async fn zrev_range(
        &self,
        ctx: &Context,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZSetValue>> {
        self.zrange_with_scores(ctx, ranged("zrevrange", key, start, stop, None))
            .await
    }

    /// Members with a score in `min..=max`. `limit` is an `(offset, count)` pair.
    ///
    /// Ref: <https://redis.io/docs/latest/commands/zrangebyscore/>
    pub async fn zrange_by_score(
        &self,
        ctx: &Context,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<ZSetValue>> {
        self.zrange_with_scores(ctx, ranged("zrangebyscore", key, min, max, limit))
            .await
    }

    /// Like [`Client::zrange_by_score`], highest score first. Note `max` comes before `min`.
    pub async fn zrev_range_by_score(
        &self,
        ctx: &Context,
        key: &str,
        max: f64,
        min: f64,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<ZSetValue>> {
        self.zrange_with_scores(ctx, ranged("zrevrangebyscore", key, max, min, limit))
            .await
    }

    /// Returns [`crate::Error::Nil`] when the member is not in the set.
    pub async fn zrank(&self, ctx: &Context, key: &str, member: impl Into<Arg>) -> Result<i64> {
        self.call_int(ctx, cmd("zrank").arg(key).arg(member)).await
    }

    pub async fn zrev_rank(&self, ctx: &Context, key: &str, member: impl Into<Arg>) -> Result<i64> {
        self.call_int(ctx, cmd("zrevrank").arg(key).arg(member)).await
    }

    /// Returns [`crate::Error::Nil`] when the member is not in the set.
    pub async fn zscore(&self, ctx: &Context, key: &str, member: impl Into<Arg>) -> Result<f64> {
        self.call_float(ctx, cmd("zscore").arg(key).arg(member)).await
    }

    pub async fn zcard(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.call_int(ctx, cmd("zcard").arg(key)).await
    }

    /// `min` and `max` use the server's interval syntax, e.g. `"(1"` or `"-inf"`.
    pub async fn zcount(&self, ctx: &Context, key: &str, min: &str, max: &str) -> Result<i64> {
        self.call_int(ctx, cmd("zcount").arg(key).arg(min).arg(max))
            .await
    }

    pub async fn zrem<M: Into<Arg>>(&self, ctx: &Context, key: &str, members: Vec<M>) -> Result<i64> {
        self.call_int(ctx, cmd("zrem").arg(key).args(members)).await
    }

    pub async fn zrem_range_by_rank(
        &self,
        ctx: &Context,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<i64> {
        self.call_int(ctx, cmd("zremrangebyrank").arg(key).arg(start).arg(stop))
            .await
    }

    /// `min` and `max` use the server's interval syntax, e.g. `"(1"` or `"-inf"`.
    pub async fn zrem_range_by_score(
        &self,
        ctx: &Context,
        key: &str,
        min: &str,
        max: &str,
    ) -> Result<i64> {
        self.call_int(ctx, cmd("zremrangebyscore").arg(key).arg(min).arg(max))
            .await
    }

    // Replies alternate member and score; both are read straight off the wire.
    async fn zrange_with_scores(&self, ctx: &Context, request: Request) -> Result<Vec<ZSetValue>> {
        self.execute(ctx, request, |conn, request| {
            Box::pin(async move {
                conn.send(request).await?;

                let pairs = conn.read_pairs(Reply::into_bytes, Reply::into_float).await?;
                Ok(pairs
                    .into_iter()
                    .map(|(member, score)| ZSetValue { member, score })
                    .collect())
            })
        })
        .await
    }
}

fn ranged(
    name: &str,
    key: &str,
    start: impl Into<Arg>,
    stop: impl Into<Arg>,
    limit: Option<(i64, i64)>,
) -> Request {
    let request = cmd(name).arg(key).arg(start).arg(stop).arg("WITHSCORES");
    match limit {
        Some((offset, count)) => request.arg("LIMIT").arg(offset).arg(count),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::FakeServer;
    use crate::Error;

    #[tokio::test]
    async fn zadd_with_flags() {
        let (client, server) = FakeServer::client(&[b":2\r\n", b":1\r\n"]);
        let ctx = Context::background();

        let values = [ZSetValue::new("a", 1.0), ZSetValue::new("b", 2.5)];
        assert_eq!(
            client
                .zadd(&ctx, "z", ZAddFlags::default(), &values)
                .await
                .unwrap(),
            2
        );

        let flags = ZAddFlags {
            condition: SetCondition::IfPresent,
            changed: true,
        };
        assert_eq!(
            client
                .zadd(&ctx, "z", flags, &[ZSetValue::new("a", -3.0)])
                .await
                .unwrap(),
            1
        );

        assert_eq!(
            server.requests(),
            vec!["zadd z 1 a 2.5 b", "zadd z XX CH -3 a"]
        );
    }

    #[tokio::test]
    async fn ranges_come_back_with_scores() {
        let (client, server) = FakeServer::client(&[
            b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$3\r\n2.5\r\n",
            b"*2\r\n$1\r\nb\r\n$3\r\ninf\r\n",
            b"*0\r\n",
        ]);
        let ctx = Context::background();

        assert_eq!(
            client.zrange(&ctx, "z", 0, -1).await.unwrap(),
            vec![ZSetValue::new("a", 1.0), ZSetValue::new("b", 2.5)]
        );
        assert_eq!(
            client
                .zrev_range_by_score(&ctx, "z", f64::INFINITY, 2.0, Some((0, 1)))
                .await
                .unwrap(),
            vec![ZSetValue::new("b", f64::INFINITY)]
        );
        assert!(client
            .zrange_by_score(&ctx, "z", 10.0, 20.0, None)
            .await
            .unwrap()
            .is_empty());

        assert_eq!(
            server.requests(),
            vec![
                "zrange z 0 -1 WITHSCORES",
                "zrevrangebyscore z inf 2 WITHSCORES LIMIT 0 1",
                "zrangebyscore z 10 20 WITHSCORES",
            ]
        );
    }

    #[tokio::test]
    async fn rank_and_score_of_missing_member_are_nil() {
        let (client, _) = FakeServer::client(&[b":0\r\n", b"$-1\r\n", b"$-1\r\n", b"$4\r\n3.75\r\n"]);
        let ctx = Context::background();

        assert_eq!(client.zrank(&ctx, "z", "a").await.unwrap(), 0);
        assert!(client.zrev_rank(&ctx, "z", "x").await.unwrap_err().is_nil());
        assert!(matches!(client.zscore(&ctx, "z", "x").await, Err(Error::Nil)));
        assert_eq!(client.zincr_by(&ctx, "z", "a", 0.25).await.unwrap(), 3.75);
    }

    #[tokio::test]
    async fn counting_and_removal() {
        let (client, server) =
            FakeServer::client(&[b":3\r\n", b":2\r\n", b":1\r\n", b":1\r\n", b":1\r\n"]);
        let ctx = Context::background();

        assert_eq!(client.zcard(&ctx, "z").await.unwrap(), 3);
        assert_eq!(client.zcount(&ctx, "z", "(1", "+inf").await.unwrap(), 2);
        assert_eq!(client.zrem(&ctx, "z", vec!["a"]).await.unwrap(), 1);
        assert_eq!(client.zrem_range_by_rank(&ctx, "z", 0, 0).await.unwrap(), 1);
        assert_eq!(
            client
                .zrem_range_by_score(&ctx, "z", "-inf", "2")
                .await
                .unwrap(),
            1
        );

        assert_eq!(
            server.requests(),
            vec![
                "zcard z",
                "zcount z (1 +inf",
                "zrem z a",
                "zremrangebyrank z 0 0",
                "zremrangebyscore z -inf 2",
            ]
        );
    }

    #[tokio::test]
    async fn bad_score_leaves_the_connection_aligned() {
        let (client, _) = FakeServer::client(&[
            b"*4\r\n$1\r\na\r\n$3\r\nabc\r\n$1\r\nb\r\n$1\r\n2\r\n",
            b":2\r\n",
        ]);
        let ctx = Context::background();

        assert!(matches!(
            client.zrange(&ctx, "z", 0, -1).await,
            Err(Error::InvalidValue(_))
        ));
        assert_eq!(client.zcard(&ctx, "z").await.unwrap(), 2);
        assert_eq!(client.pool_stats().misses, 1);
    }
}
