use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cinebox_order::ledger::normalize_seats;
use cinebox_order::{HoldToken, LedgerError, SeatLedger};
use tracing::info;
use uuid::Uuid;

// KEYS: seat keys. ARGV: token, ttl in ms.
// Returns the 1-based positions of seats already taken; empty when the hold was placed.
const HOLD_SCRIPT: &str = r#"
    local taken = {}
    for i, key in ipairs(KEYS) do
        if redis.call("EXISTS", key) == 1 then
            table.insert(taken, i)
        end
    end
    if #taken > 0 then
        return taken
    end
    for _, key in ipairs(KEYS) do
        redis.call("SET", key, ARGV[1], "PX", ARGV[2])
    end
    return taken
"#;

// All seats must still carry the token, then drop their TTL
const CONFIRM_SCRIPT: &str = r#"
    for _, key in ipairs(KEYS) do
        if redis.call("GET", key) ~= ARGV[1] then
            return 0
        end
    end
    for _, key in ipairs(KEYS) do
        redis.call("PERSIST", key)
    end
    return 1
"#;

// Only delete keys still owned by the token
const RELEASE_SCRIPT: &str = r#"
    local freed = 0
    for _, key in ipairs(KEYS) do
        if redis.call("GET", key) == ARGV[1] then
            redis.call("DEL", key)
            freed = freed + 1
        end
    end
    return freed
"#;

/// Seat ledger shared by every API instance. One key per `(schedule, seat)`;
/// holds expire natively through `PX`.
#[derive(Clone)]
pub struct RedisSeatLedger {
    client: redis::Client,
    hold: redis::Script,
    confirm: redis::Script,
    release: redis::Script,
}

fn seat_key(schedule_id: i64, seat_id: i64) -> String {
    format!("seat:{}:{}", schedule_id, seat_id)
}

fn seat_from_key(key: &str) -> Option<i64> {
    key.rsplit(':').next()?.parse().ok()
}

fn seat_pattern(schedule_id: i64) -> String {
    format!("seat:{}:*", schedule_id)
}

/// SCAN may hand back the same key more than once
fn seats_from_keys<'a>(keys: impl IntoIterator<Item = &'a String>) -> Vec<i64> {
    let mut seats: Vec<i64> = keys.into_iter().filter_map(|k| seat_from_key(k)).collect();
    seats.sort_unstable();
    seats.dedup();
    seats
}

const SCAN_BATCH: usize = 500;

fn backend(e: redis::RedisError) -> LedgerError {
    LedgerError::Backend(e.to_string())
}

impl RedisSeatLedger {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            hold: redis::Script::new(HOLD_SCRIPT),
            confirm: redis::Script::new(CONFIRM_SCRIPT),
            release: redis::Script::new(RELEASE_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, LedgerError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }

    fn keys(token: &HoldToken) -> Vec<String> {
        token
            .seat_ids
            .iter()
            .map(|seat_id| seat_key(token.schedule_id, *seat_id))
            .collect()
    }
}

#[async_trait]
impl SeatLedger for RedisSeatLedger {
    async fn try_hold(
        &self,
        schedule_id: i64,
        seat_ids: &[i64],
        holder_id: i64,
        ttl: Duration,
    ) -> Result<HoldToken, LedgerError> {
        let seats = normalize_seats(seat_ids);
        if seats.is_empty() {
            return Err(LedgerError::EmptySelection);
        }

        let token = HoldToken {
            id: Uuid::new_v4(),
            schedule_id,
            seat_ids: seats,
            holder_id,
            expires_at: Utc::now() + ttl,
        };
        // PX must be positive
        let ttl_ms = ttl.num_milliseconds().max(1);

        let mut conn = self.connection().await?;
        let mut invocation = self.hold.prepare_invoke();
        for key in Self::keys(&token) {
            invocation.key(key);
        }
        let taken: Vec<usize> = invocation
            .arg(token.id.to_string())
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        if !taken.is_empty() {
            let seat_ids = taken
                .iter()
                .filter_map(|pos| token.seat_ids.get(pos.saturating_sub(1)).copied())
                .collect();
            return Err(LedgerError::SeatTaken { seat_ids });
        }

        info!("Hold {} placed on schedule {} seats {:?}", token.id, schedule_id, token.seat_ids);
        Ok(token)
    }

    async fn confirm(&self, token: &HoldToken) -> Result<(), LedgerError> {
        if token.is_expired(Utc::now()) {
            return Err(LedgerError::HoldNotActive(token.id));
        }

        let mut conn = self.connection().await?;
        let mut invocation = self.confirm.prepare_invoke();
        for key in Self::keys(token) {
            invocation.key(key);
        }
        let confirmed: i64 = invocation
            .arg(token.id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        if confirmed != 1 {
            return Err(LedgerError::HoldNotActive(token.id));
        }
        Ok(())
    }

    async fn release(&self, token: &HoldToken) -> Result<bool, LedgerError> {
        let mut conn = self.connection().await?;
        let mut invocation = self.release.prepare_invoke();
        for key in Self::keys(token) {
            invocation.key(key);
        }
        let freed: i64 = invocation
            .arg(token.id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        Ok(freed > 0)
    }

    async fn occupied(&self, schedule_id: i64) -> Result<Vec<i64>, LedgerError> {
        let mut conn = self.connection().await?;
        let pattern = seat_pattern(schedule_id);
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(seats_from_keys(&keys))
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, LedgerError> {
        // Redis drops expired holds itself
        Ok(0)
    }
}
