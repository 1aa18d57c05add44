use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "board_logins_total",
        "Login attempts by resolved role and outcome",
        &["role", "status"]
    ).unwrap();

    pub static ref QUESTIONS_COUNTER: CounterVec = register_counter_vec!(
        "board_question_operations_total",
        "Question create/edit/delete operations",
        &["action"]
    ).unwrap();

    pub static ref ANNOUNCEMENTS_COUNTER: CounterVec = register_counter_vec!(
        "board_announcement_operations_total",
        "Announcement create/edit/confirm/delete operations",
        &["action"]
    ).unwrap();

    pub static ref ATTACHMENTS_COUNTER: CounterVec = register_counter_vec!(
        "board_attachments_uploaded_total",
        "Files written to the upload area",
        &["outcome"]
    ).unwrap();

    pub static ref STORAGE_FALLBACKS_COUNTER: CounterVec = register_counter_vec!(
        "board_storage_fallbacks_total",
        "Degraded collection reads (legacy decoding, unparsable file)",
        &["kind"]
    ).unwrap();

    // ── Live state ──────────────────────────────────────────────────────────
    pub static ref SESSIONS_GAUGE: Gauge = register_gauge!(
        "board_sessions_active",
        "Sessions currently held in memory"
    ).unwrap();
}
