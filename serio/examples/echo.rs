//! Echo protocol over an in-memory device.
//!
//! The mock device stands in for a UART: bytes pushed into its input show up
//! in `data_received`, the protocol writes them straight back, and the echo
//! is read off the device output.
//!
//! Run with: cargo run --example echo

use std::time::Duration;

use log::info;
use serio::device::MockDevice;
use serio::{
    Bytes, CallbackResult, Error, Protocol, ReadinessMode, SerialTransport, TransportConfig,
};
use tokio::task::LocalSet;

#[derive(Default)]
struct Echo {
    transport: Option<SerialTransport>,
    echoed: usize,
}

impl Protocol for Echo {
    fn connection_made(&mut self, transport: SerialTransport) -> CallbackResult {
        info!("Connected: {:?}", transport.get_extra_info("serial"));
        self.transport = Some(transport);
        Ok(())
    }

    fn data_received(&mut self, data: Bytes) -> CallbackResult {
        info!("Received {} bytes: {:?}", data.len(), String::from_utf8_lossy(&data));
        self.echoed += data.len();
        if let Some(transport) = &self.transport {
            transport.write(data);
        }
        Ok(())
    }

    fn connection_lost(&mut self, error: Option<Error>) -> CallbackResult {
        match error {
            Some(e) => info!("Connection lost after {} bytes: {}", self.echoed, e),
            None => info!("Connection closed after {} bytes", self.echoed),
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> serio::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let config = TransportConfig::new()
        .with_readiness(ReadinessMode::Poll)
        .with_poll_interval(Duration::from_millis(1));

    LocalSet::new()
        .run_until(async move {
            let (device, handle) = MockDevice::new("mock-uart");
            let transport = SerialTransport::spawn_local(device, Echo::default(), config)?;

            let messages: [&[u8]; 3] = [b"Hello, World!", b"ping", b"serial line"];
            for message in messages {
                handle.push_input(message);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            transport.close();
            while !handle.is_closed() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            info!("Device output: {:?}", String::from_utf8_lossy(&handle.output()));
            Ok(())
        })
        .await
}
