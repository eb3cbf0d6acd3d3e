use colored::*;

/// Transient user-facing notice surface.
///
/// The core never depends on a concrete transport; whatever hosts it (a
/// terminal, a desktop notification daemon, a browser surface) supplies one
/// of these.
pub trait Notifier: Send + Sync {
  fn notify(&self, message: &str);
}

/// Prints notices to stderr, keeping stdout free for command output.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  fn notify(&self, message: &str) {
    eprintln!("{} {message}", "•".blue());
  }
}

/// Swallows notices. For contexts where nobody is watching.
pub struct NullNotifier;

impl Notifier for NullNotifier {
  fn notify(&self, _message: &str) {}
}
