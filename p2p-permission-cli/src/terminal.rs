//! Terminal renditions of the permission presenters
//!
//! The "OS" here is simulated: answering the prompt flips the shared
//! [`StaticOracle`], and the host reports the answer back through
//! `apply_permission_change` once the request call returns.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use p2p_permission::permission::{
    AdvisoryPresenter, FixCallback, InteractivePrompt, NotificationAction, NotificationPresenter,
    NotificationResponder, PermissionNotification, RationaleDialog, StaticOracle,
};

/// Answer to the simulated OS permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsAnswer {
    Allow,
    Deny,
    DenyAlways,
}

impl OsAnswer {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Self::Allow,
            "d" | "dont" | "don't ask again" | "never" => Self::DenyAlways,
            _ => Self::Deny, // Default to deny
        }
    }
}

/// Parse a notification action; an empty answer dismisses
pub fn parse_notification_action(input: &str) -> Option<NotificationAction> {
    match input.trim().to_lowercase().as_str() {
        "f" | "fix" => Some(NotificationAction::Fix),
        "d" | "disable" => Some(NotificationAction::Disable),
        "" | "x" | "dismiss" => Some(NotificationAction::Dismiss),
        _ => None,
    }
}

fn ask(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", question)?;
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input)
}

/// Interactive prompt rendered on the terminal
pub struct TerminalPrompt {
    oracle: Arc<StaticOracle>,
    rationale: bool,
    answered: Mutex<Option<bool>>,
}

impl TerminalPrompt {
    /// `rationale` is the simulated OS hint returned by `should_show_rationale`
    pub fn new(oracle: Arc<StaticOracle>, rationale: bool) -> Self {
        Self {
            oracle,
            rationale,
            answered: Mutex::new(None),
        }
    }

    /// Whether the user made a choice, and if so whether it was permanent
    pub fn take_answer(&self) -> Option<bool> {
        self.answered.lock().unwrap().take()
    }

    fn answer(&self, permanent: bool) {
        *self.answered.lock().unwrap() = Some(permanent);
    }

    fn prompt_os(&self) -> io::Result<OsAnswer> {
        println!();
        println!("Allow this app to find, connect to, and determine the relative");
        println!("position of nearby devices?");
        Ok(OsAnswer::parse(&ask("[y]es / [n]o / [d]on't ask again: ")?))
    }
}

impl InteractivePrompt for TerminalPrompt {
    fn request_permission(&self) {
        let answer = self.prompt_os().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read prompt answer");
            OsAnswer::Deny
        });
        if answer == OsAnswer::Allow {
            self.oracle.set_granted(true);
        }
        self.answer(answer == OsAnswer::DenyAlways);
    }

    fn should_show_rationale(&self) -> bool {
        self.rationale
    }

    fn show_rationale(&self, dialog: RationaleDialog, on_fix: FixCallback) {
        println!();
        println!("{}", dialog.message);
        let question = format!("[f] {} / [c]ancel: ", dialog.fix_label);
        match ask(&question) {
            Ok(input) if matches!(input.trim().to_lowercase().as_str(), "f" | "fix") => on_fix(),
            Ok(_) => self.answer(false),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read dialog answer");
                self.answer(false);
            }
        }
    }

    fn redirect_to_settings(&self) {
        println!();
        println!("Open the system settings for this app and allow nearby devices.");
        match ask("Allowed in settings? [y/N]: ") {
            Ok(input) if OsAnswer::parse(&input) == OsAnswer::Allow => {
                self.oracle.set_granted(true)
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read settings answer"),
        }
        self.answer(false);
    }
}

impl std::fmt::Debug for TerminalPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPrompt")
            .field("rationale", &self.rationale)
            .finish()
    }
}

/// Notification presenter that prints to the terminal
#[derive(Default)]
pub struct TerminalNotificationPresenter {
    responder: Mutex<Option<NotificationResponder>>,
}

impl TerminalNotificationPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responder of the notification currently shown
    pub fn take_responder(&self) -> Option<NotificationResponder> {
        self.responder.lock().unwrap().take()
    }

    /// Ask which notification action to take, re-asking on invalid input
    pub fn read_action(&self) -> io::Result<NotificationAction> {
        loop {
            let input = ask("[f]ix / [d]isable / dismiss with Enter: ")?;
            match parse_notification_action(&input) {
                Some(action) => return Ok(action),
                None => println!("Invalid input"),
            }
        }
    }
}

impl NotificationPresenter for TerminalNotificationPresenter {
    fn show(&self, notification: PermissionNotification, responder: NotificationResponder) {
        println!();
        println!("== {} ==", notification.title);
        println!("{}", notification.body);
        println!("  [f] {}    [d] {}", notification.fix_label, notification.disable_label);
        *self.responder.lock().unwrap() = Some(responder);
    }

    fn cancel(&self) {
        if self.responder.lock().unwrap().take().is_some() {
            tracing::debug!("Permission notification cancelled");
        }
    }

    fn open_remediation(&self) {
        println!("Run `p2p-permission request --explain` from a terminal to fix.");
    }
}

impl std::fmt::Debug for TerminalNotificationPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalNotificationPresenter")
            .field("shown", &self.responder.lock().unwrap().is_some())
            .finish()
    }
}

/// Advisory presenter that prints to stderr
#[derive(Debug, Default)]
pub struct TerminalAdvisoryPresenter;

impl AdvisoryPresenter for TerminalAdvisoryPresenter {
    fn show_advisory(&self, message: &str) {
        eprintln!("note: {}", message);
    }
}

/// Check if stdout is connected to a terminal
pub fn is_terminal() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: isatty is safe to call with any file descriptor
        unsafe { libc::isatty(std::io::stdout().as_raw_fd()) != 0 }
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::System::Console::{GetConsoleMode, CONSOLE_MODE};
        let handle = std::io::stdout().as_raw_handle();
        let mut mode: CONSOLE_MODE = 0;
        // SAFETY: GetConsoleMode is safe with valid handle
        unsafe { GetConsoleMode(handle as _, &mut mode) != 0 }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::env::var("TERM").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_answer_parse() {
        assert_eq!(OsAnswer::parse("y\n"), OsAnswer::Allow);
        assert_eq!(OsAnswer::parse("YES"), OsAnswer::Allow);
        assert_eq!(OsAnswer::parse("d"), OsAnswer::DenyAlways);
        assert_eq!(OsAnswer::parse(""), OsAnswer::Deny);
        assert_eq!(OsAnswer::parse("maybe"), OsAnswer::Deny);
    }

    #[test]
    fn test_notification_action_parse() {
        assert_eq!(parse_notification_action("f"), Some(NotificationAction::Fix));
        assert_eq!(
            parse_notification_action("Disable\n"),
            Some(NotificationAction::Disable)
        );
        assert_eq!(
            parse_notification_action("\n"),
            Some(NotificationAction::Dismiss)
        );
        assert_eq!(parse_notification_action("q"), None);
    }

    #[test]
    fn test_prompt_reports_rationale_hint() {
        let prompt = TerminalPrompt::new(Arc::new(StaticOracle::denied()), true);
        assert!(prompt.should_show_rationale());
        assert_eq!(prompt.take_answer(), None);
    }
}
