//! Database schema definitions

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Trader profiles and derived statistics (upserted by address)
CREATE TABLE IF NOT EXISTS traders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL UNIQUE,
    username TEXT,
    profile_url TEXT,
    total_volume REAL NOT NULL DEFAULT 0,
    total_trades INTEGER NOT NULL DEFAULT 0,
    markets_traded INTEGER NOT NULL DEFAULT 0,
    win_rate REAL,
    avg_position_size REAL,
    first_seen_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

-- Reconciled positions (upserted by trader + market + outcome).
-- market_id is NOT NULL: the repair pass guarantees every position carries
-- a market reference, a placeholder one if nothing could be linked.
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trader_address TEXT NOT NULL,
    market_id TEXT NOT NULL,
    outcome TEXT NOT NULL DEFAULT '',
    shares REAL NOT NULL DEFAULT 0,
    invested_amount REAL NOT NULL DEFAULT 0,
    avg_entry_price REAL,
    current_value REAL,
    realized_pnl REAL,
    reconstructed INTEGER NOT NULL DEFAULT 0,
    entered_at INTEGER,
    exited_at INTEGER,
    last_updated TEXT,
    UNIQUE(trader_address, market_id, outcome)
);

-- Append-only activity ledger, keyed by transaction hash
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_hash TEXT NOT NULL UNIQUE,
    trader_address TEXT NOT NULL,
    market_id TEXT,
    activity_type TEXT NOT NULL,
    side TEXT,
    outcome TEXT,
    shares_amount REAL NOT NULL DEFAULT 0,
    cash_amount REAL NOT NULL DEFAULT 0,
    price REAL,
    fee_amount REAL NOT NULL DEFAULT 0,
    realized_pnl REAL,
    asset_id TEXT,
    timestamp INTEGER,
    metadata TEXT,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Markets referenced by positions and activities (upserted by market_id).
-- placeholder = 1 marks rows created for identifiers the gateway could not
-- resolve.
CREATE TABLE IF NOT EXISTS markets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id TEXT NOT NULL UNIQUE,
    condition_id TEXT,
    question TEXT NOT NULL DEFAULT '',
    category TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    closed INTEGER NOT NULL DEFAULT 0,
    resolved INTEGER NOT NULL DEFAULT 0,
    volume REAL NOT NULL DEFAULT 0,
    liquidity REAL NOT NULL DEFAULT 0,
    end_date TEXT,
    placeholder INTEGER NOT NULL DEFAULT 0,
    last_synced_at TEXT
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_trader_address ON traders(address);
CREATE INDEX IF NOT EXISTS idx_position_trader ON positions(trader_address);
CREATE INDEX IF NOT EXISTS idx_position_market ON positions(market_id);
CREATE INDEX IF NOT EXISTS idx_activity_trader ON activities(trader_address);
CREATE INDEX IF NOT EXISTS idx_activity_type ON activities(activity_type);
CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activities(timestamp);
CREATE INDEX IF NOT EXISTS idx_market_id ON markets(market_id)
"#;

/// ALTER TABLE migrations for databases created before a column existed.
/// "duplicate column name" errors are tolerated on subsequent runs.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE traders ADD COLUMN profile_url TEXT",
    "ALTER TABLE positions ADD COLUMN exited_at INTEGER",
];
