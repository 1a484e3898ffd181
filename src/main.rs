use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{bail, eyre, Result};
use wb4_vip::{Config, MemorySlave, Sequence, SingleReadSequence, SingleWriteSequence, Testbench};

/// Runs a write/read round trip against the built-in memory responder.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Maximum clock edges to run before giving up.
    #[arg(long, default_value_t = 100)]
    cycles: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    println!("🚀 Wishbone B4 verification agent starting...");

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let responder = MemorySlave::new(config.responder);
    let (mut tb, handles) = Testbench::from_config(&config, responder)?;
    let sequencer = handles
        .sequencer
        .ok_or_else(|| eyre!("the configured agent has no driver"))?;

    tb.reset_for(2);

    let mut write = SingleWriteSequence::new()
        .address(0x10)
        .data(0xAA)
        .select(0xF)
        .start(&sequencer)?;
    let mut read = SingleReadSequence::new()
        .address(0x10)
        .select(0xF)
        .transmit_delay(1)
        .start(&sequencer)?;

    let taken = tb.run_until(args.cycles, |_| {
        write.try_status().is_some() && read.try_status().is_some()
    });
    let Some(taken) = taken else {
        bail!("items still pending after {} edges", args.cycles);
    };
    println!("✅ write: {:?}", write.try_status());
    println!("✅ read:  {:?} ({} edges)", read.try_status(), taken);

    // let the last read response come back
    tb.run_for(u64::from(config.responder.ack_latency) + 1);

    if let Some(mut analysis) = handles.analysis {
        while let Ok(record) = analysis.try_recv() {
            println!("   {}", record);
        }
    }

    println!("🎉 Ran {} edges, memory[0x10] = {:#x}", tb.edge(), tb.responder().peek(0x10));
    Ok(())
}
