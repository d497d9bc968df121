//! Terminal rendering of build progress.

use owo_colors::{OwoColorize, Stream};

use steppack_lib::build::BuildError;
use steppack_lib::listener::BuildListener;
use steppack_lib::step::BuildStepConfig;
use steppack_lib::validate::ValidationError;

use crate::output::{describe_finding, format_bytes, print_error, print_warning, symbols};

/// Prints one line per step event. With `verbose`, step starts are shown too.
pub struct ConsoleListener {
  verbose: bool,
}

impl ConsoleListener {
  pub fn new(verbose: bool) -> Self {
    Self { verbose }
  }
}

impl BuildListener for ConsoleListener {
  fn on_build_start(&self, step: &BuildStepConfig) {
    if self.verbose {
      println!(
        "  {} {} {}",
        symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()),
        step.name(),
        step.entrypoint_path.if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    }
  }

  fn on_build_end(&self, step: &BuildStepConfig, size: u64) {
    println!(
      "  {} {} [{}] {}",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
      step.name(),
      step.language,
      format_bytes(size).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  fn on_build_error(&self, step: &BuildStepConfig, error: &BuildError) {
    print_error(&format!("{} ({}): {}", step.entrypoint_path, step.name(), error));
  }

  fn on_build_warning(&self, warning: &ValidationError) {
    print_warning(&describe_finding(warning));
  }

  fn on_build_errors(&self, errors: &[ValidationError]) {
    for error in errors {
      print_error(&describe_finding(error));
    }
  }
}
