//! Operator views of the active-session registry.
//!
//! The host never calls these. They exist so a person (or a cron job) can see
//! which background sessions are live and clear the ones orphaned by a crash.

use activity_core::{ActiveSession, HookConfig, HookError, HookPaths, SessionRegistry};
use chrono::{DateTime, Duration, Utc};

fn open_registry() -> Result<SessionRegistry, HookError> {
    let paths = HookPaths::resolve()?;
    let config = HookConfig::load_or_default(&paths.config);
    Ok(SessionRegistry::new(paths.with_overrides(&config).registry)
        .with_lock_timeout(config.lock_timeout()))
}

pub fn list(json: bool) -> Result<(), HookError> {
    let sessions = open_registry()?.snapshot()?;

    if json {
        let rendered = serde_json::to_string_pretty(&sessions)
            .map_err(|e| HookError::json("Failed to render registry", e))?;
        println!("{}", rendered);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No active sessions");
        return Ok(());
    }
    for line in render_table(&sessions, Utc::now()) {
        println!("{}", line);
    }
    Ok(())
}

pub fn prune(older_than_minutes: u32) -> Result<(), HookError> {
    let registry = open_registry()?;
    let cutoff = Utc::now() - Duration::minutes(i64::from(older_than_minutes));
    let pruned = registry.prune_started_before(cutoff)?;

    for session in &pruned {
        tracing::info!(
            id = %session.id,
            session_type = %session.session_type,
            started_at = %session.started_at,
            "Pruned orphaned session"
        );
    }
    println!("Pruned {} session(s)", pruned.len());
    Ok(())
}

fn render_table(sessions: &[ActiveSession], now: DateTime<Utc>) -> Vec<String> {
    let id_width = sessions
        .iter()
        .map(|s| s.id.chars().count())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    let type_width = sessions
        .iter()
        .map(|s| s.session_type.chars().count())
        .max()
        .unwrap_or(0)
        .max("TYPE".len());

    let mut lines = vec![format!(
        "{:<id_width$}  {:<type_width$}  AGE",
        "ID", "TYPE"
    )];
    for session in sessions {
        lines.push(format!(
            "{:<id_width$}  {:<type_width$}  {}",
            session.id,
            session.session_type,
            format_age(now.signed_duration_since(session.started_at))
        ));
    }
    lines
}

fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s => format!("{}h{}m", s / 3600, (s % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_age_buckets() {
        assert_eq!(format_age(Duration::seconds(-5)), "0s");
        assert_eq!(format_age(Duration::seconds(42)), "42s");
        assert_eq!(format_age(Duration::seconds(125)), "2m");
        assert_eq!(format_age(Duration::seconds(3 * 3600 + 7 * 60)), "3h7m");
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let now = Utc::now();
        let sessions = vec![
            ActiveSession::new("a1", "sw-engineer", now - Duration::seconds(30)),
            ActiveSession::new("agent-long-id", "qa", now - Duration::minutes(5)),
        ];

        let lines = render_table(&sessions, now);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID             TYPE         AGE");
        assert_eq!(lines[1], "a1             sw-engineer  30s");
        assert_eq!(lines[2], "agent-long-id  qa           5m");
    }

    #[test]
    fn test_render_table_pads_non_ascii_by_chars() {
        let now = Utc::now();
        let sessions = vec![
            ActiveSession::new("agent-é", "révision", now - Duration::seconds(1)),
            ActiveSession::new("b2", "qa", now - Duration::seconds(2)),
        ];

        let lines = render_table(&sessions, now);

        assert_eq!(lines[0], "ID       TYPE      AGE");
        assert_eq!(lines[1], "agent-é  révision  1s");
        assert_eq!(lines[2], "b2       qa        2s");
    }
}
