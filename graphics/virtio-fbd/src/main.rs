// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! virtio-fbd daemon
//!
//! Runs the framebuffer driver against a simulated DISPI adapter and a
//! loopback VirtIO transport, with a built-in client that follows custom
//! mode requests the way a window server would.

use std::path::PathBuf;
use std::process::exit;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use gal::Extent2D;
use gal_virtio::{LoopbackTransport, VirtioTransport};
use virtio_fbd::memory::HeapMemory;
use virtio_fbd::pci::parse_hex_u16;
use virtio_fbd::properties::PropertyTable;
use virtio_fbd::vbe::{default_vram_size, dispi, SimulatedDispi, VbeDisplayBus, MIB};
use virtio_fbd::{
    classify, probe_score, Attribute, CustomModeData, DeviceIdentity, DriverConfig, Framebuffer,
    InterruptProc, InterruptRef, InterruptType, ModeId, SwitchStep,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// PCI vendor id (hex)
    #[clap(long, value_parser = parse_id, default_value = "0x1af4")]
    vendor: u16,
    /// PCI device id (hex)
    #[clap(long, value_parser = parse_id, default_value = "0x1050")]
    device: u16,
    #[clap(long, value_parser = parse_id, default_value = "0")]
    subsystem_vendor: u16,
    #[clap(long, value_parser = parse_id, default_value = "0")]
    subsystem: u16,
    /// Read the ids from a sysfs PCI device directory instead
    #[clap(long, value_name = "DIR")]
    sysfs: Option<PathBuf>,
    /// Largest geometry the simulated adapter accepts
    #[clap(long, default_value_t = 1920)]
    max_width: u32,
    #[clap(long, default_value_t = 1080)]
    max_height: u32,
    /// VRAM size; defaults by device family
    #[clap(long)]
    vram_mib: Option<u64>,
    /// Custom mode to request, e.g. 1600x900
    #[clap(long, value_parser = parse_geometry)]
    mode: Option<Extent2D>,
    /// Keep running this long before stopping
    #[clap(long, default_value_t = 0)]
    hold_ms: u64,
}

impl Args {
    fn identity(&self) -> anyhow::Result<DeviceIdentity> {
        match &self.sysfs {
            Some(dir) => DeviceIdentity::from_sysfs(dir)
                .with_context(|| format!("reading ids from {}", dir.display())),
            None => Ok(DeviceIdentity::new(self.vendor, self.device)
                .with_subsystem(self.subsystem_vendor, self.subsystem)),
        }
    }
}

fn parse_id(s: &str) -> Result<u16, String> {
    parse_hex_u16(s).map_err(|e| e.to_string())
}

fn parse_geometry(s: &str) -> Result<Extent2D, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("{:?} is not WIDTHxHEIGHT", s))?;
    let w = w.trim().parse().map_err(|e| format!("width: {}", e))?;
    let h = h.trim().parse().map_err(|e| format!("height: {}", e))?;
    Ok(Extent2D::new(w, h))
}

fn vram_bytes(mib: u64) -> anyhow::Result<u64> {
    match mib.checked_mul(MIB) {
        Some(bytes) => Ok(bytes),
        None => bail!("{} MiB of VRAM is out of range", mib),
    }
}

/// Stand-in for a window server: follows custom mode requests
struct Client {
    interrupt: InterruptRef,
    worker: JoinHandle<()>,
}

impl Client {
    fn spawn(fb: &Arc<Framebuffer>) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: InterruptProc = Arc::new(move |_| {
            // the receiver is gone once the client has exited
            let _ = tx.lock().send(());
        });
        let interrupt = fb.register_interrupt(InterruptType::Connect, callback, 0)?;

        let weak = Arc::downgrade(fb);
        let worker = thread::Builder::new()
            .name("virtio-fbd-client".to_string())
            .spawn(move || client_loop(weak, rx))
            .context("spawning client thread")?;
        Ok(Self { interrupt, worker })
    }

    fn stop(self, fb: &Framebuffer) {
        if let Err(err) = fb.unregister_interrupt(self.interrupt) {
            warn!("virtio-fbd: client unregister: {}", err);
        }
        if self.worker.join().is_err() {
            error!("virtio-fbd: client thread panicked");
        }
    }
}

fn client_loop(fb: Weak<Framebuffer>, rx: Receiver<()>) {
    while rx.recv().is_ok() {
        let Some(fb) = fb.upgrade() else {
            break;
        };
        match fb.display_modes() {
            Ok(modes) => debug!("virtio-fbd: client sees {} mode(s)", modes.len()),
            Err(err) => {
                debug!("virtio-fbd: client: {}", err);
                continue;
            }
        }
        if fb.switch_step().ok() != Some(SwitchStep::Requested) {
            continue;
        }
        if let Err(err) = fb.set_display_mode(ModeId::CUSTOM, 0) {
            warn!("virtio-fbd: client could not select custom mode: {}", err);
            continue;
        }
        if let Err(err) = fb.set_attribute(Attribute::Captured, 0) {
            warn!("virtio-fbd: client could not release capture: {}", err);
        }
    }
    debug!("virtio-fbd: client exiting");
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = DriverConfig::from_env();
    debug!("virtio-fbd: {:?}", config);

    let identity = args.identity()?;
    let profile = classify(identity);
    match probe_score(identity) {
        Some(score) => info!("virtio-fbd: {} matched, probe score {}", identity, score),
        None => bail!("no supported display adapter at {}", identity),
    }

    let vram = match args.vram_mib {
        Some(mib) => vram_bytes(mib)?,
        None => default_vram_size(profile.family, None),
    };
    let port = SimulatedDispi::new(
        Extent2D::new(args.max_width, args.max_height),
        Extent2D::new(1024, 768),
    );
    let region = Arc::new(HeapMemory::new(
        dispi::LFB_PHYSICAL_ADDRESS,
        usize::try_from(vram).context("VRAM size")?,
    ));
    let bus = VbeDisplayBus::new(Box::new(port), region, vram);

    let transport: Arc<dyn VirtioTransport> = if profile.supports_3d() {
        Arc::new(LoopbackTransport::with_virgl())
    } else {
        Arc::new(LoopbackTransport::new())
    };
    let properties = Arc::new(PropertyTable::new());
    let fb = Arc::new(Framebuffer::new(
        identity,
        Box::new(bus),
        config,
        properties.clone(),
        Some(transport),
    ));

    let client = Client::spawn(&fb)?;
    let result = drive(&fb, &args);
    for (key, value) in properties.entries() {
        info!("virtio-fbd: {} = {}", key, value);
    }
    fb.stop();
    client.stop(&fb);
    result
}

fn drive(fb: &Framebuffer, args: &Args) -> anyhow::Result<()> {
    fb.start().context("starting framebuffer")?;
    info!(
        "virtio-fbd: {} modes, acceleration {}",
        fb.display_mode_count()?,
        fb.acceleration().unwrap_or_default()
    );

    if let Some(mode) = args.mode {
        let request = CustomModeData {
            flags: CustomModeData::SET,
            width: mode.width,
            height: mode.height,
        };
        let mut reply = [0u8; CustomModeData::SIZE];
        let got = fb
            .custom_mode(Some(bytemuck::bytes_of(&request)), Some(&mut reply[..]))
            .with_context(|| format!("switching to {}", mode))?;
        info!("virtio-fbd: now at {}x{}", got.width, got.height);
    }

    if args.hold_ms > 0 {
        thread::sleep(Duration::from_millis(args.hold_ms));
    }

    let (current, _) = fb.current_display_mode()?;
    let modes = fb.display_modes()?;
    info!("virtio-fbd: current mode {}, modes {:?}", current, modes);
    Ok(())
}

fn main() {
    env_logger::init();
    info!("virtio-fbd v{}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(Args::parse()) {
        error!("virtio-fbd: {:#}", err);
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        assert_eq!(parse_geometry("1600x900"), Ok(Extent2D::new(1600, 900)));
        assert_eq!(parse_geometry("800X600"), Ok(Extent2D::new(800, 600)));
        assert!(parse_geometry("1600").is_err());
        assert!(parse_geometry("ax600").is_err());
    }

    #[test]
    fn test_vram_bytes() {
        assert_eq!(vram_bytes(16).unwrap(), 16 * MIB);
        assert!(vram_bytes(u64::MAX / 1024).is_err());
    }

    #[test]
    fn test_args_identity() {
        let args = Args::parse_from([
            "virtio-fbd",
            "--vendor",
            "1414",
            "--device",
            "0x5353",
            "--subsystem-vendor",
            "0x1414",
            "--subsystem",
            "dda2",
        ]);
        let id = args.identity().unwrap();
        assert_eq!(id, DeviceIdentity::new(0x1414, 0x5353).with_subsystem(0x1414, 0xDDA2));
    }
}
