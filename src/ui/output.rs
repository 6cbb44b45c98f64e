use crate::identity::Identity;
use crate::ui::theme::Tone;
use crate::ui::{theme, Icons};

fn paint(text: &str, tone: Tone) -> String {
    theme().paint(text, tone)
}

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, paint(text, Tone::Heading));
}

/// `<icon> Label: value`
pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, paint(label, Tone::Label), value);
}

pub fn success(message: &str) {
    println!("{} {}", Icons::CHECK, paint(message, Tone::Success));
}

/// Errors and warnings go to stderr
pub fn error(message: &str) {
    eprintln!("{} {}", Icons::CROSS, paint(message, Tone::Failure));
}

pub fn warn(message: &str) {
    eprintln!("{} {}", Icons::WARN, paint(message, Tone::Caution));
}

pub fn info(label: &str, value: &str) {
    status(&paint(Icons::INFO, Tone::Accent), label, value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", paint(title, Tone::Heading));
}

pub fn dim(text: &str) -> String {
    paint(text, Tone::Label)
}

pub fn muted(text: &str) -> String {
    paint(text, Tone::Faint)
}

/// One persisted row, as `🔑 User 1`
pub fn identity_line(type_name: &str, identity: &Identity) {
    println!(
        "{} {} {}",
        paint(Icons::KEY, Tone::Accent),
        dim(type_name),
        paint(&identity.to_string(), Tone::Identity)
    );
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", dim(label), value);
}
