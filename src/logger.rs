use std::cell::RefCell;
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

/// Log event types that determine which receivers should log the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// Per-bid decisions (winner changes, loss stamps, throttle draws)
    Auction,
    /// Per-request summary (overlay applied, throttle set, default bids, warnings)
    Request,
    /// Scenario-level data (comparisons between runs, scenario summaries)
    Scenario,
    /// Validation results (pass/fail messages, validation checks)
    Validation,
}

impl LogEvent {
    const ALL: [LogEvent; 4] = [LogEvent::Auction, LogEvent::Request, LogEvent::Scenario, LogEvent::Validation];

    /// Higher is more detailed
    fn detail(self) -> u8 {
        match self {
            LogEvent::Auction => 3,
            LogEvent::Request => 2,
            LogEvent::Scenario => 1,
            LogEvent::Validation => 0,
        }
    }
}

pub trait LogReceiverTrait {
    fn should_log(&self, event: LogEvent) -> bool;
    fn write(&mut self, s: &str) -> io::Result<()>;
}

/// Receiver over any byte sink, flushed after every write
pub struct WriterReceiver {
    out: Box<dyn Write>,
    enabled_events: Vec<LogEvent>,
}

impl WriterReceiver {
    pub fn console(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiverTrait> {
        Box::new(Self { out: Box::new(io::stdout()), enabled_events })
    }

    /// Truncates an existing file, creates missing parent directories
    pub fn file(path: &Path, enabled_events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiverTrait>> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(Self { out: Box::new(file), enabled_events }))
    }
}

impl LogReceiverTrait for WriterReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())?;
        self.out.flush()
    }
}

/// Keeps every line in a buffer the caller still holds after boxing the receiver
pub struct MemoryReceiver {
    lines: Rc<RefCell<Vec<String>>>,
    enabled_events: Vec<LogEvent>,
}

impl MemoryReceiver {
    pub fn new(enabled_events: Vec<LogEvent>) -> (Box<dyn LogReceiverTrait>, Rc<RefCell<Vec<String>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let receiver: Box<dyn LogReceiverTrait> = Box::new(Self { lines: Rc::clone(&lines), enabled_events });
        (receiver, lines)
    }
}

impl LogReceiverTrait for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.lines.borrow_mut().push(s.trim_end_matches('\n').to_string());
        Ok(())
    }
}

pub type ReceiverId = usize;

/// Fans messages out to the receivers listening for their event
#[derive(Default)]
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiverTrait>)>,
    next_id: ReceiverId,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiverTrait>) -> ReceiverId {
        self.next_id += 1;
        self.receivers.push((self.next_id, receiver));
        self.next_id
    }

    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.write_where(message, |receiver| receiver.should_log(event))
    }

    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// "ERROR" line for `event` and every less detailed event
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.flagged(event, "ERROR", message)
    }

    /// "WARNING" line for `event` and every less detailed event
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.flagged(event, "WARNING", message)
    }

    // A receiver listening to several of the reached events still gets one line
    fn flagged(&mut self, event: LogEvent, label: &str, message: &str) -> io::Result<()> {
        let line = format!("{} {}\n", label, message);
        self.write_where(&line, |receiver| {
            LogEvent::ALL.iter().any(|e| e.detail() <= event.detail() && receiver.should_log(*e))
        })
    }

    fn write_where<F>(&mut self, text: &str, wants: F) -> io::Result<()>
    where
        F: Fn(&dyn LogReceiverTrait) -> bool,
    {
        for (_, receiver) in &mut self.receivers {
            if wants(receiver.as_ref()) {
                receiver.write(text)?;
            }
        }
        Ok(())
    }
}

/// Like println! but for logger
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Like print! but for logger
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_receiver_filters_events() {
        let mut logger = Logger::new();
        let (receiver, lines) = MemoryReceiver::new(vec![LogEvent::Request]);
        logger.add_receiver(receiver);

        logln!(logger, LogEvent::Auction, "per-bid detail");
        logln!(logger, LogEvent::Request, "request summary {}", 7);

        assert_eq!(*lines.borrow(), vec!["request summary 7".to_string()]);
    }

    #[test]
    fn test_warnln_reaches_less_detailed_events_once() {
        let mut logger = Logger::new();
        let (receiver, lines) = MemoryReceiver::new(vec![LogEvent::Request, LogEvent::Validation]);
        logger.add_receiver(receiver);

        warnln!(logger, LogEvent::Auction, "missing impression {}", "imp1");

        assert_eq!(*lines.borrow(), vec!["WARNING missing impression imp1".to_string()]);
    }

    #[test]
    fn test_errln_skips_more_detailed_events() {
        let mut logger = Logger::new();
        let (auction, auction_lines) = MemoryReceiver::new(vec![LogEvent::Auction]);
        let (validation, validation_lines) = MemoryReceiver::new(vec![LogEvent::Validation]);
        logger.add_receiver(auction);
        logger.add_receiver(validation);

        errln!(logger, LogEvent::Scenario, "check failed");

        assert!(auction_lines.borrow().is_empty());
        assert_eq!(*validation_lines.borrow(), vec!["ERROR check failed".to_string()]);
    }

    #[test]
    fn test_removed_receiver_gets_nothing() {
        let mut logger = Logger::new();
        let (receiver, lines) = MemoryReceiver::new(vec![LogEvent::Scenario]);
        let (kept, kept_lines) = MemoryReceiver::new(vec![LogEvent::Scenario]);
        let id = logger.add_receiver(receiver);
        let kept_id = logger.add_receiver(kept);
        assert_ne!(id, kept_id);
        logger.remove_receiver(id);

        logln!(logger, LogEvent::Scenario, "dropped");

        assert!(lines.borrow().is_empty());
        assert_eq!(*kept_lines.borrow(), vec!["dropped".to_string()]);
    }
}
