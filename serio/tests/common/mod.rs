#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use serio::{Bytes, CallbackResult, Error, Protocol, SerialTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Made,
    Data(Vec<u8>),
    Pause,
    Resume,
    Lost(Option<io::ErrorKind>),
}

/// Event log shared between a test and its protocol.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }

    pub fn received(&self) -> Vec<u8> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Data(data) => Some(data.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

/// Records every callback; optionally echoes received data back.
#[derive(Debug, Default)]
pub struct Recorder {
    pub log: EventLog,
    pub echo: bool,
    pub fail_flow_callbacks: bool,
    transport: Option<SerialTransport>,
}

impl Recorder {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn echo(log: &EventLog) -> Self {
        Self {
            echo: true,
            ..Self::new(log)
        }
    }
}

impl Protocol for Recorder {
    fn connection_made(&mut self, transport: SerialTransport) -> CallbackResult {
        self.log.push(Event::Made);
        self.transport = Some(transport);
        Ok(())
    }

    fn data_received(&mut self, data: Bytes) -> CallbackResult {
        self.log.push(Event::Data(data.to_vec()));
        if self.echo {
            if let Some(transport) = &self.transport {
                transport.write(data);
            }
        }
        Ok(())
    }

    fn connection_lost(&mut self, error: Option<Error>) -> CallbackResult {
        self.log.push(Event::Lost(error.and_then(|e| e.io_kind())));
        self.transport = None;
        Ok(())
    }

    fn pause_writing(&mut self) -> CallbackResult {
        self.log.push(Event::Pause);
        if self.fail_flow_callbacks {
            return Err("pause_writing exploded".into());
        }
        Ok(())
    }

    fn resume_writing(&mut self) -> CallbackResult {
        self.log.push(Event::Resume);
        if self.fail_flow_callbacks {
            return Err("resume_writing exploded".into());
        }
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
