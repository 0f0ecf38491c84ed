// ── Inbound channels ──
//
// The two ways change events reach the client. The notifier owns exactly
// one active inbound channel at a time.

pub(crate) mod persistent;
pub(crate) mod polling;
