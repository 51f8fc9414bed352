mod port;

use std::time::Instant;

use log::{error, info, warn};
use serio::{
    Bytes, CallbackResult, Error, Protocol, ReadinessMode, SerialTransport, TransportConfig,
};
use tokio::task::LocalSet;

use port::Port;

const DEFAULT_BAUD_RATE: u32 = 115_200;
const USAGE: &str = "usage: serio-echo <port> [baud] [--poll]";

struct Echo {
    transport: Option<SerialTransport>,
    started: Instant,
    echoed: usize,
}

impl Echo {
    fn new() -> Self {
        Self {
            transport: None,
            started: Instant::now(),
            echoed: 0,
        }
    }
}

impl Protocol for Echo {
    fn connection_made(&mut self, transport: SerialTransport) -> CallbackResult {
        info!("Echoing in {:?} mode", transport.readiness_mode());
        self.started = Instant::now();
        self.transport = Some(transport);
        Ok(())
    }

    fn data_received(&mut self, data: Bytes) -> CallbackResult {
        self.echoed += data.len();
        if let Some(transport) = &self.transport {
            transport.write(data);
        }
        Ok(())
    }

    fn connection_lost(&mut self, error: Option<Error>) -> CallbackResult {
        if let Some(e) = error {
            error!("Connection lost: {}", e);
        }

        let elapsed = self.started.elapsed();
        let speed = (self.echoed as f64 / 1024.0) / elapsed.as_secs_f64();
        info!("=== Echo Complete ===");
        info!("Total echoed: {} KB", self.echoed / 1024);
        info!("Time: {:.2} seconds", elapsed.as_secs_f64());
        info!("Speed: {:.2} KB/s", speed);

        self.transport = None;
        Ok(())
    }

    // The peer sends faster than the line drains: stop reading until it does.
    fn pause_writing(&mut self) -> CallbackResult {
        warn!("Write buffer full, pausing input");
        if let Some(transport) = &self.transport {
            transport.pause_reading();
        }
        Ok(())
    }

    fn resume_writing(&mut self) -> CallbackResult {
        info!("Write buffer drained, resuming input");
        if let Some(transport) = &self.transport {
            transport.resume_reading();
        }
        Ok(())
    }
}

struct Args {
    path: String,
    baud_rate: u32,
    readiness: ReadinessMode,
}

fn parse_args() -> serio::Result<Args> {
    let mut path = None;
    let mut baud_rate = DEFAULT_BAUD_RATE;
    let mut readiness = ReadinessMode::Auto;

    for arg in std::env::args().skip(1) {
        if arg == "--poll" {
            readiness = ReadinessMode::Poll;
        } else if path.is_none() {
            path = Some(arg);
        } else {
            baud_rate = arg
                .parse()
                .map_err(|_| Error::Configuration(format!("invalid baud rate: {arg}")))?;
        }
    }

    let path = path.ok_or_else(|| Error::Configuration(USAGE.into()))?;
    Ok(Args {
        path,
        baud_rate,
        readiness,
    })
}

fn main() -> serio::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let port = Port::open(&args.path, args.baud_rate)?;
    let config = TransportConfig::new().with_readiness(args.readiness);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    LocalSet::new().block_on(&runtime, async move {
        let (transport, driver) = SerialTransport::new(port, Echo::new(), config)?;

        tokio::task::spawn_local(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, closing {}", args.path);
                transport.close();
            }
        });

        driver.run().await;
        Ok(())
    })
}
