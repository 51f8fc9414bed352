//! Transport behavior in poll mode against the in-memory mock device.

mod common;

use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use common::{Event, EventLog, Recorder, init_logging};
use serio::device::{MockDevice, MockHandle};
use serio::{
    Bytes, CallbackResult, DeviceInfo, Error, ExtraInfo, Lifecycle, Protocol, ReadinessMode,
    SerialTransport, TransportConfig,
};
use tokio::task::LocalSet;

fn poll_config() -> TransportConfig {
    TransportConfig::new()
        .with_readiness(ReadinessMode::Poll)
        .with_poll_interval(Duration::from_millis(1))
}

/// Lets the driver run a handful of poll ticks.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn start(name: &str, config: TransportConfig) -> (SerialTransport, MockHandle, EventLog) {
    init_logging();
    let (device, handle) = MockDevice::new(name);
    let log = EventLog::default();
    let transport = SerialTransport::spawn_local(device, Recorder::new(&log), config).unwrap();
    (transport, handle, log)
}

#[tokio::test(start_paused = true)]
async fn test_connection_made_is_deferred() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-made", poll_config());

            assert!(log.events().is_empty());
            assert!(handle.is_nonblocking());
            assert_eq!(transport.readiness_mode(), ReadinessMode::Poll);

            settle().await;
            assert_eq!(log.events(), vec![Event::Made]);
            assert_eq!(transport.lifecycle(), Lifecycle::Active);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_immediate_abort_still_reports_made_first() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-abort-early", poll_config());
            transport.abort();

            settle().await;
            assert_eq!(log.events(), vec![Event::Made, Event::Lost(None)]);
            assert!(handle.is_closed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_write_reaches_device() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, _log) = start("mock-write", poll_config());

            transport.write(&b"Hello, World!"[..]);
            settle().await;

            assert_eq!(handle.output(), b"Hello, World!");
            assert!(transport.is_flushed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_blocked_device_buffers_writes() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, _log) = start("mock-blocked", poll_config());
            handle.set_write_blocked(true);

            transport.write(&b"Hello, World!"[..]);
            settle().await;

            assert_eq!(transport.get_write_buffer_size(), 13);
            assert_eq!(
                transport.get_extra_info("write_buffer_size"),
                Some(ExtraInfo::WriteBufferSize(13))
            );
            assert!(handle.output().is_empty());

            handle.set_write_blocked(false);
            settle().await;
            assert_eq!(handle.output(), b"Hello, World!");
            assert_eq!(transport.get_write_buffer_size(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_partial_writes_keep_order() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, _log) = start("mock-partial", poll_config());
            handle.set_write_limit(Some(4));

            transport.write(&b"abc"[..]);
            transport.write(&b"defgh"[..]);
            settle().await;

            assert_eq!(handle.output(), b"abcdefgh");
            assert_eq!(handle.write_calls(), vec![3, 4, 1]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_partial_write_resends_suffix() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, _log) = start("mock-suffix", poll_config());
            handle.set_write_limit(Some(5));

            transport.write(&b"hello world"[..]);
            settle().await;

            assert_eq!(handle.output(), b"hello world");
            assert_eq!(handle.write_calls(), vec![5, 5, 1]);
            assert!(transport.is_flushed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_flow_control_pauses_and_resumes_once() {
    LocalSet::new()
        .run_until(async {
            let config = poll_config().with_water_marks(10, 5);
            let (transport, handle, log) = start("mock-flow", config);
            handle.set_write_blocked(true);
            handle.set_write_limit(Some(3));

            transport.write(&b"1234567890"[..]);
            settle().await;
            assert_eq!(log.events(), vec![Event::Made, Event::Pause]);

            handle.set_write_blocked(false);
            settle().await;

            assert_eq!(log.events(), vec![Event::Made, Event::Pause, Event::Resume]);
            assert_eq!(handle.output(), b"1234567890");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_below_high_water_mark_never_pauses() {
    LocalSet::new()
        .run_until(async {
            let config = poll_config().with_water_marks(10, 5);
            let (transport, handle, log) = start("mock-no-pause", config);
            handle.set_write_blocked(true);

            transport.write(&b"123456789"[..]);
            settle().await;
            handle.set_write_blocked(false);
            settle().await;

            assert_eq!(log.count(&Event::Pause), 0);
            assert_eq!(log.count(&Event::Resume), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_lowering_limits_pauses() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-limits", poll_config());
            settle().await;
            handle.set_write_blocked(true);

            transport.write(vec![0u8; 100]);
            settle().await;
            assert_eq!(log.count(&Event::Pause), 0);

            transport.set_write_buffer_limits(Some(50), None).unwrap();
            settle().await;
            assert_eq!(log.count(&Event::Pause), 1);

            let marks = transport.get_write_buffer_limits();
            assert_eq!((marks.high(), marks.low()), (50, 12));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_limits_are_rejected() {
    LocalSet::new()
        .run_until(async {
            let (transport, _handle, _log) = start("mock-bad-limits", poll_config());
            let before = transport.get_write_buffer_limits();

            assert!(matches!(
                transport.set_write_buffer_limits(Some(1), Some(2)),
                Err(Error::Configuration(_))
            ));
            assert_eq!(transport.get_write_buffer_limits(), before);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_data_received_in_chunks() {
    LocalSet::new()
        .run_until(async {
            let config = poll_config().with_read_buffer_size(4);
            let (_transport, handle, log) = start("mock-read", config);

            handle.push_input(b"abcdefghij");
            settle().await;

            assert_eq!(log.received(), b"abcdefghij");
            assert_eq!(
                log.events()[1..],
                [
                    Event::Data(b"abcd".to_vec()),
                    Event::Data(b"efgh".to_vec()),
                    Event::Data(b"ij".to_vec()),
                ]
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_reading_holds_input() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-pause-read", poll_config());
            transport.pause_reading();
            assert!(!transport.is_reading());

            handle.push_input(b"held");
            settle().await;
            assert!(log.received().is_empty());

            transport.resume_reading();
            assert!(transport.is_reading());
            settle().await;
            assert_eq!(log.received(), b"held");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_echo_from_data_received() {
    LocalSet::new()
        .run_until(async {
            init_logging();
            let (device, handle) = MockDevice::new("mock-echo");
            let log = EventLog::default();
            let _transport =
                SerialTransport::spawn_local(device, Recorder::echo(&log), poll_config()).unwrap();

            handle.push_input(b"ping");
            settle().await;

            assert_eq!(log.received(), b"ping");
            assert_eq!(handle.output(), b"ping");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_close_drains_before_connection_lost() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-drain", poll_config());
            handle.set_write_blocked(true);

            transport.write(&b"last words"[..]);
            transport.close();
            transport.write(&b" ignored"[..]);
            settle().await;

            assert!(transport.is_closing());
            assert_eq!(transport.lifecycle(), Lifecycle::Closing);
            assert_eq!(log.count(&Event::Lost(None)), 0);
            assert!(!handle.is_closed());

            handle.set_write_blocked(false);
            settle().await;

            assert_eq!(handle.output(), b"last words");
            assert_eq!(log.events().last(), Some(&Event::Lost(None)));
            assert_eq!(transport.lifecycle(), Lifecycle::Closed);
            assert!(handle.is_closed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_double_close_reports_once() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-close-twice", poll_config());
            settle().await;

            transport.close();
            transport.close();
            settle().await;

            assert_eq!(log.events(), vec![Event::Made, Event::Lost(None)]);
            assert_eq!(
                transport.get_extra_info("closing"),
                Some(ExtraInfo::Closing(true))
            );
            assert!(handle.is_closed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_abort_discards_buffer() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-abort", poll_config());
            settle().await;
            handle.set_write_blocked(true);

            transport.write(&b"never sent"[..]);
            transport.abort();
            assert_eq!(transport.get_write_buffer_size(), 0);

            transport.abort();
            transport.write(&b"after abort"[..]);
            settle().await;

            assert_eq!(transport.get_write_buffer_size(), 0);
            assert_eq!(log.count(&Event::Lost(None)), 1);
            assert!(handle.output().is_empty());
            assert!(handle.is_closed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_abort_while_closing_finishes_close() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-close-abort", poll_config());
            handle.set_write_blocked(true);

            transport.write(&b"stuck"[..]);
            transport.close();
            settle().await;
            transport.abort();
            settle().await;

            assert_eq!(log.events(), vec![Event::Made, Event::Lost(None)]);
            assert!(handle.output().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_loses_connection() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-read-fail", poll_config());
            handle.push_input(b"x");
            handle.fail_next_read(io::ErrorKind::BrokenPipe);
            settle().await;

            assert_eq!(
                log.events(),
                vec![Event::Made, Event::Lost(Some(io::ErrorKind::BrokenPipe))]
            );
            assert_eq!(transport.lifecycle(), Lifecycle::Closed);
            assert!(handle.is_closed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_loses_connection() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-write-fail", poll_config());
            handle.fail_next_write(io::ErrorKind::PermissionDenied);

            transport.write(&b"doomed"[..]);
            settle().await;

            assert_eq!(
                log.events(),
                vec![Event::Made, Event::Lost(Some(io::ErrorKind::PermissionDenied))]
            );
            assert_eq!(transport.get_write_buffer_size(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_read_error_is_retried() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, log) = start("mock-transient", poll_config());
            handle.push_input(b"later");
            handle.fail_next_read(io::ErrorKind::Interrupted);
            settle().await;

            assert_eq!(log.received(), b"later");
            assert_eq!(transport.lifecycle(), Lifecycle::Active);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_counter_failure_loses_connection() {
    LocalSet::new()
        .run_until(async {
            let (_transport, handle, log) = start("mock-counters", poll_config());
            settle().await;

            handle.fail_counters(io::ErrorKind::Other);
            settle().await;

            assert_eq!(log.count(&Event::Lost(Some(io::ErrorKind::Other))), 1);
            assert!(handle.is_closed());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_full_output_buffer_defers_writes() {
    LocalSet::new()
        .run_until(async {
            let (transport, handle, _log) = start("mock-out-waiting", poll_config());
            handle.set_out_waiting(4096);

            transport.write(&b"wait"[..]);
            settle().await;
            assert!(handle.write_calls().is_empty());

            handle.set_out_waiting(0);
            settle().await;
            assert_eq!(handle.output(), b"wait");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_callbacks_do_not_break_transport() {
    LocalSet::new()
        .run_until(async {
            init_logging();
            let (device, handle) = MockDevice::new("mock-failing-callbacks");
            let log = EventLog::default();
            let mut protocol = Recorder::new(&log);
            protocol.fail_flow_callbacks = true;
            let config = poll_config().with_water_marks(4, 2);
            let transport = SerialTransport::spawn_local(device, protocol, config).unwrap();
            handle.set_write_blocked(true);

            transport.write(&b"overflow"[..]);
            settle().await;
            handle.set_write_blocked(false);
            settle().await;

            assert_eq!(log.count(&Event::Pause), 1);
            assert_eq!(log.count(&Event::Resume), 1);
            assert_eq!(handle.output(), b"overflow");
            assert_eq!(transport.lifecycle(), Lifecycle::Active);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_extra_info() {
    LocalSet::new()
        .run_until(async {
            let (transport, _handle, _log) = start("mock-info", poll_config());

            assert_eq!(
                transport.get_extra_info("serial"),
                Some(ExtraInfo::Serial(DeviceInfo {
                    name: "mock-info".into(),
                    descriptor: None,
                }))
            );
            assert_eq!(
                transport.get_extra_info("closing"),
                Some(ExtraInfo::Closing(false))
            );
            assert_eq!(transport.get_extra_info("peername"), None);
            assert_eq!(
                transport.get_extra_info_or("peername", ExtraInfo::Closing(true)),
                ExtraInfo::Closing(true)
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_write_eof_unsupported() {
    LocalSet::new()
        .run_until(async {
            let (transport, _handle, _log) = start("mock-eof", poll_config());

            assert!(!transport.can_write_eof());
            assert!(matches!(transport.write_eof(), Err(Error::EofUnsupported)));
        })
        .await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (device, _handle) = MockDevice::new("mock-config");
    let log = EventLog::default();
    let config = poll_config().with_water_marks(1, 2);

    let result = SerialTransport::new(device, Recorder::new(&log), config);
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_requires_runtime() {
    let (device, _handle) = MockDevice::new("mock-no-runtime");
    let log = EventLog::default();

    let result = SerialTransport::new(device, Recorder::new(&log), poll_config());
    assert!(matches!(result, Err(Error::PlatformUnsupported(_))));
}

#[derive(Debug, Clone, Copy)]
enum Hangup {
    AbortOnMade,
    AbortOnData,
    CloseOnData,
}

/// Ends the connection from inside a callback and records whether the
/// device was already closed when `connection_lost` ran.
struct EndsItself {
    how: Hangup,
    handle: MockHandle,
    transport: Option<SerialTransport>,
    closed_at_lost: Rc<Cell<Option<bool>>>,
}

impl EndsItself {
    fn end(&self) {
        if let Some(transport) = &self.transport {
            match self.how {
                Hangup::CloseOnData => transport.close(),
                Hangup::AbortOnMade | Hangup::AbortOnData => transport.abort(),
            }
        }
    }
}

impl Protocol for EndsItself {
    fn connection_made(&mut self, transport: SerialTransport) -> CallbackResult {
        self.transport = Some(transport);
        if let Hangup::AbortOnMade = self.how {
            self.end();
        }
        Ok(())
    }

    fn data_received(&mut self, _data: Bytes) -> CallbackResult {
        self.end();
        Ok(())
    }

    fn connection_lost(&mut self, _error: Option<Error>) -> CallbackResult {
        self.closed_at_lost.set(Some(self.handle.is_closed()));
        Ok(())
    }
}

async fn closed_when_lost(how: Hangup) -> Option<bool> {
    init_logging();
    let (device, handle) = MockDevice::new("mock-ends-itself");
    let closed_at_lost = Rc::new(Cell::new(None));
    let protocol = EndsItself {
        how,
        handle: handle.clone(),
        transport: None,
        closed_at_lost: closed_at_lost.clone(),
    };
    let transport = SerialTransport::spawn_local(device, protocol, poll_config()).unwrap();

    handle.push_input(b"bye");
    settle().await;

    assert_eq!(transport.lifecycle(), Lifecycle::Closed);
    closed_at_lost.get()
}

#[tokio::test(start_paused = true)]
async fn test_abort_from_data_received_releases_before_lost() {
    LocalSet::new()
        .run_until(async {
            assert_eq!(closed_when_lost(Hangup::AbortOnData).await, Some(true));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_close_from_data_received_releases_before_lost() {
    LocalSet::new()
        .run_until(async {
            assert_eq!(closed_when_lost(Hangup::CloseOnData).await, Some(true));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_abort_from_connection_made_releases_before_lost() {
    LocalSet::new()
        .run_until(async {
            assert_eq!(closed_when_lost(Hangup::AbortOnMade).await, Some(true));
        })
        .await;
}
