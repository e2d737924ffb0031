//! Cristian-style time sync: run once, at connect time, against the
//! host (or, for the peer that first dials in, the bootstrap peer
//! itself) the way `game.go`'s unfinished `syncTime` intended -- two
//! sequential `GetTime` calls bound the round trip, and the result
//! overwrites local time unconditionally, no smoothing, no rejection
//! of outliers.

use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};

use tangram_protocol::codec::MessageCodec;
use tangram_protocol::{GetTimeRequest, Request, Response};

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Issues one `GetTime` call over a fresh bidirectional stream on
/// `conn`, returning the callee's milliseconds since its own
/// `origin_time`.
async fn get_time(conn: &quinn::Connection) -> anyhow::Result<i64> {
    let (send, recv) = conn.open_bi().await?;
    let mut writer = FramedWrite::new(send, MessageCodec::<Request>::default());
    writer.send(Request::GetTime(GetTimeRequest)).await?;
    writer.get_mut().finish()?;

    let mut reader = FramedRead::new(recv, MessageCodec::<Response>::default());
    let resp = reader
        .next()
        .await
        .ok_or_else(|| anyhow::anyhow!("peer closed the stream without answering GetTime"))??;

    match resp {
        Response::GetTime(r) => Ok(r.since_origin_ms),
        other => Err(anyhow::anyhow!("unexpected response to GetTime: {other:?}")),
    }
}

/// Performs the Cristian exchange over `conn` -- two sequential
/// `GetTime` calls bound the round trip -- and returns the new
/// `origin_time_unix_ms` this peer should adopt.
pub async fn sync_time_over_connection(conn: &quinn::Connection) -> anyhow::Result<i64> {
    let d1 = get_time(conn).await?;
    let d2 = get_time(conn).await?;
    let t0 = now_unix_ms();

    Ok(cristian_origin(d1, d2, t0))
}

fn cristian_origin(d1: i64, d2: i64, t0: i64) -> i64 {
    let rtt = d2 - d1;
    t0 - rtt / 2 - d2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_formula_computes_origin_from_round_trip() {
        let d1 = 100i64;
        let d2 = 140i64;
        let t0 = 10_000i64;
        assert_eq!(cristian_origin(d1, d2, t0), 10_000 - 20 - 140);
    }
}
