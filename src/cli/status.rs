use ansi_term::Colour;

use crate::{
    engine::{timeline::session_label, StatusSnapshot},
    storage::documents::Session,
    utils::time::format_hms,
};

pub fn print_status(snapshot: &StatusSnapshot) {
    let state = if snapshot.running { "running" } else { "paused" };
    println!("Today     {} ({state})", format_hms(snapshot.elapsed));
    println!(
        "Adjusted  {}",
        adjustment_color(snapshot).paint(snapshot.net_adjustment.display.as_str())
    );
    println!("Projects  {}", format_hms(snapshot.project_sum));
    println!("Sync      {}", drift_label(snapshot));
    println!();
    print_projects(snapshot);
}

pub fn print_projects(snapshot: &StatusSnapshot) {
    for project in &snapshot.projects {
        let marker = if project.active { "*" } else { " " };
        println!(
            "{marker} {} {}\t{}\t{}",
            hex_color(&project.color).paint("●"),
            format_hms(project.elapsed),
            project.id,
            project.name,
        );
    }
}

pub fn print_sessions(day: &str, sessions: &[Session]) {
    if sessions.is_empty() {
        println!("No sessions recorded on {day}");
        return;
    }
    println!("Sessions on {day}");
    for session in sessions {
        println!(
            "{} {}",
            hex_color(&session.project_color).paint("●"),
            session_label(session)
        );
    }
}

pub fn print_history(entries: &[(String, i64)]) {
    for (day, seconds) in entries {
        println!("{day}\t{}", format_hms(*seconds));
    }
}

/// Single line for the live watch view.
pub fn status_line(snapshot: &StatusSnapshot) -> String {
    let state = if snapshot.running { "▶" } else { "⏸" };
    let active = snapshot
        .projects
        .iter()
        .find(|p| p.active)
        .map(|p| p.name.as_str())
        .unwrap_or("-");
    format!(
        "{state} {}  {}  {}  {}",
        format_hms(snapshot.elapsed),
        adjustment_color(snapshot).paint(snapshot.net_adjustment.display.as_str()),
        active,
        drift_label(snapshot),
    )
}

fn adjustment_color(snapshot: &StatusSnapshot) -> Colour {
    if snapshot.net_adjustment.is_positive {
        Colour::Green
    } else {
        Colour::Red
    }
}

fn drift_label(snapshot: &StatusSnapshot) -> String {
    if snapshot.drift.in_sync() {
        Colour::Green.paint("in sync").to_string()
    } else {
        Colour::Yellow
            .paint(format!("off by {}s", snapshot.drift.difference.abs()))
            .to_string()
    }
}

fn hex_color(hex: &str) -> Colour {
    let hex = hex.trim_start_matches('#');
    let parse = |range| u8::from_str_radix(hex.get(range).unwrap_or("ff"), 16).unwrap_or(0xff);
    if hex.len() == 6 {
        Colour::RGB(parse(0..2), parse(2..4), parse(4..6))
    } else {
        Colour::White
    }
}

#[cfg(test)]
mod tests {
    use super::hex_color;
    use ansi_term::Colour;

    #[test]
    fn hex_colors_parse_into_rgb() {
        assert_eq!(hex_color("#28a745"), Colour::RGB(0x28, 0xa7, 0x45));
        assert_eq!(hex_color("007bff"), Colour::RGB(0x00, 0x7b, 0xff));
        assert_eq!(hex_color("nope"), Colour::White);
    }
}
