//! SQL schemas for the market-data and positioning databases.
//!
//! Executed on every open and on every run; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. Tables are never dropped.

/// Market-data database: roots, contracts, calendar dates, and the daily
/// contract fact table.
pub const MARKET_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS root_commodity (
    id_root  INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL,
    market   TEXT NOT NULL,
    alias    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS contract (
    id_contract INTEGER PRIMARY KEY AUTOINCREMENT,
    month       TEXT    NOT NULL,   -- delivery-month letter
    year        INTEGER NOT NULL,
    id_root     INTEGER NOT NULL REFERENCES root_commodity(id_root)
                ON DELETE CASCADE,
    UNIQUE (id_root, month, year)
);

CREATE TABLE IF NOT EXISTS trade_date (
    id_date INTEGER PRIMARY KEY AUTOINCREMENT,
    date    TEXT NOT NULL UNIQUE    -- YYYY-MM-DD
);

-- Append-only. At most one observation per contract per day.
CREATE TABLE IF NOT EXISTS contract_date (
    price         REAL    NOT NULL,
    open_interest INTEGER,
    volume        INTEGER,
    id_date       INTEGER NOT NULL REFERENCES trade_date(id_date)
                  ON DELETE CASCADE ON UPDATE NO ACTION,
    id_contract   INTEGER NOT NULL REFERENCES contract(id_contract)
                  ON DELETE CASCADE ON UPDATE NO ACTION,
    PRIMARY KEY (id_date, id_contract)
);

CREATE INDEX IF NOT EXISTS contract_date_contract_idx ON contract_date(id_contract);

PRAGMA user_version = 1;
";

/// Positioning database: report types, actor categories, commodities,
/// report dates, and the actor-level position fact table.
pub const POSITIONING_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS report (
    id_report INTEGER PRIMARY KEY AUTOINCREMENT,
    type      TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS actor (
    id_actor  INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT    NOT NULL,
    id_report INTEGER NOT NULL REFERENCES report(id_report) ON DELETE CASCADE,
    UNIQUE (name, id_report)
);

CREATE TABLE IF NOT EXISTS commodity (
    id_commo  INTEGER PRIMARY KEY AUTOINCREMENT,
    alias     TEXT NOT NULL UNIQUE,
    commodity TEXT NOT NULL,
    market    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS observation_date (
    id_date INTEGER PRIMARY KEY AUTOINCREMENT,
    day     INTEGER NOT NULL,
    month   INTEGER NOT NULL,
    year    INTEGER NOT NULL,
    UNIQUE (year, month, day)
);

-- Append-only. A retried run must not record the same holding twice.
CREATE TABLE IF NOT EXISTS position (
    id_position   INTEGER PRIMARY KEY AUTOINCREMENT,
    value         INTEGER NOT NULL,
    position_type TEXT    NOT NULL,
    crop          TEXT    NOT NULL,
    id_actor      INTEGER NOT NULL REFERENCES actor(id_actor) ON DELETE CASCADE,
    id_date       INTEGER NOT NULL REFERENCES observation_date(id_date) ON DELETE CASCADE,
    id_commo      INTEGER NOT NULL REFERENCES commodity(id_commo) ON DELETE CASCADE,
    UNIQUE (id_date, id_actor, id_commo, position_type)
);

CREATE INDEX IF NOT EXISTS position_date_idx ON position(id_date);

PRAGMA user_version = 1;
";
