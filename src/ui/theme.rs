use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// The kinds of text rowsmith prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Heading,
    Success,
    Failure,
    Caution,
    Accent,
    /// Labels in front of values
    Label,
    /// Secondary details such as paths and counts
    Faint,
    /// Persisted identity values
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    colored: bool,
}

impl Theme {
    /// `NO_COLOR` wins over `CLICOLOR_FORCE`, which wins over terminal detection
    pub fn detect() -> Self {
        Self {
            colored: colors_enabled(
                console::Term::stdout().is_term(),
                std::env::var_os("NO_COLOR").is_some(),
                std::env::var_os("CLICOLOR_FORCE").is_some_and(|v| v != "0"),
            ),
        }
    }

    pub fn colored() -> Self {
        Self { colored: true }
    }

    pub fn plain() -> Self {
        Self { colored: false }
    }

    pub fn style(&self, tone: Tone) -> Style {
        if !self.colored {
            return Style::new();
        }
        match tone {
            Tone::Heading => Style::new().cyan().bold(),
            Tone::Success => Style::new().green().bold(),
            Tone::Failure => Style::new().red().bold(),
            Tone::Caution => Style::new().yellow().bold(),
            Tone::Accent => Style::new().magenta(),
            Tone::Label => Style::new().white().dimmed(),
            Tone::Faint => Style::new().bright_black(),
            Tone::Identity => Style::new().bold(),
        }
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        text.style(self.style(tone)).to_string()
    }
}

fn colors_enabled(is_term: bool, no_color: bool, force: bool) -> bool {
    !no_color && (force || is_term)
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_detection_order() {
        assert!(colors_enabled(true, false, false));
        assert!(!colors_enabled(false, false, false));
        assert!(colors_enabled(false, false, true));
        assert!(!colors_enabled(true, true, true));
    }

    #[test]
    fn test_plain_theme_leaves_text_untouched() {
        assert_eq!(Theme::plain().paint("User 1", Tone::Identity), "User 1");
        assert_ne!(Theme::colored().paint("User 1", Tone::Identity), "User 1");
    }
}
