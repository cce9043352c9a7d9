//! Terminal rendering of workflow steps

use colored::*;
use kyma_core::step::{StepLog, StepRecord};
use kyma_core::{Step, StepFactory, StepState};
use std::io::Write;

/// Step printed to stdout as it progresses
pub struct TerminalStep {
    record: StepRecord,
    verbose: bool,
    out: Box<dyn Write>,
}

impl TerminalStep {
    fn line(&mut self, line: impl std::fmt::Display) {
        // Progress output is best effort
        let _ = writeln!(self.out, "{}", line);
    }
}

impl Step for TerminalStep {
    fn description(&self) -> &str {
        self.record.description()
    }

    fn state(&self) -> StepState {
        self.record.state()
    }

    fn begin(&mut self) {
        if self.record.begin() {
            let line = format!("{} {}", "▸".cyan(), self.record.description().bold());
            self.line(line);
        }
    }

    fn status(&mut self, message: &str) {
        self.line(format!("    {}", message.cyan()));
        self.record.push(StepLog::Status, message);
    }

    fn info(&mut self, message: &str) {
        if self.verbose {
            self.line(format!("    {}", message.dimmed()));
        }
        self.record.push(StepLog::Info, message);
    }

    fn error(&mut self, message: &str) {
        self.line(format!("    {}", message.red()));
        self.record.push(StepLog::Error, message);
    }

    fn succeed(&mut self) {
        if self.record.finish(StepState::Succeeded) {
            let line = format!("{} {}", "✓".green().bold(), self.record.description());
            self.line(line);
        }
    }

    fn fail(&mut self) {
        if self.record.finish(StepState::Failed) {
            let line = format!("{} {}", "✗".red().bold(), self.record.description());
            self.line(line);
        }
    }

    fn stop(&mut self) {
        if self.record.finish(StepState::Stopped) {
            let line = format!("{} {}", "-".yellow().bold(), self.record.description());
            self.line(line);
        }
    }
}

/// Factory for [`TerminalStep`]
#[derive(Debug, Clone, Copy)]
pub struct TerminalFactory {
    verbose: bool,
}

impl TerminalFactory {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StepFactory for TerminalFactory {
    type Step = TerminalStep;

    fn start(&mut self, description: &str) -> TerminalStep {
        TerminalStep {
            record: StepRecord::new(description),
            verbose: self.verbose,
            out: Box::new(std::io::stdout()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    fn captured_step(description: &str, verbose: bool) -> (TerminalStep, Captured) {
        let captured = Captured::default();
        let step = TerminalStep {
            record: StepRecord::new(description),
            verbose,
            out: Box::new(captured.clone()),
        };
        (step, captured)
    }

    #[test]
    fn test_terminal_step_follows_lifecycle() {
        let mut factory = TerminalFactory::new(false);
        let mut step = factory.start("Saving cluster state");
        assert_eq!(step.state(), StepState::Pending);

        step.begin();
        step.info("hidden unless verbose");
        step.succeed();
        step.fail();

        assert!(step.is_successful());
        assert_eq!(step.record.infos(), ["hidden unless verbose"]);
    }

    #[test]
    fn test_failed_step_keeps_errors() {
        let mut step = TerminalFactory::new(true).start("Importing kubeconfig");
        step.begin();
        step.error("permission denied");
        step.fail();

        assert_eq!(step.state(), StepState::Failed);
        assert_eq!(step.record.errors(), ["permission denied"]);
    }

    #[test]
    fn test_failed_step_prints_each_error_once() {
        let (mut step, captured) = captured_step("Importing kubeconfig", false);
        step.begin();
        step.error("permission denied");
        step.error("disk full");
        step.fail();

        let text = captured.text();
        assert_eq!(text.matches("permission denied").count(), 1);
        assert_eq!(text.matches("disk full").count(), 1);
        assert_eq!(text.matches("Importing kubeconfig").count(), 2);
    }

    #[test]
    fn test_infos_are_printed_only_when_verbose() {
        let (mut quiet, quiet_out) = captured_step("Applying manifests", false);
        quiet.begin();
        quiet.info("deployment created");

        let (mut verbose, verbose_out) = captured_step("Applying manifests", true);
        verbose.begin();
        verbose.info("deployment created");

        assert!(!quiet_out.text().contains("deployment created"));
        assert!(verbose_out.text().contains("deployment created"));
    }
}
