use std::path::Path;
use std::process;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use virtmem::disk::Disk;
use virtmem::kernel::Kernel;
use virtmem::memory::MemoryStats;
use virtmem::paging::{Clock, Fifo, Random, ReplacementPolicy};
use virtmem::program;

const DISK_PATH: &str = "myvirtualdisk";

#[derive(Parser)]
#[command(name = "virtmem", about = "Demand-paged virtual memory simulator")]
struct Args {
    /// Number of virtual pages
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    npages: u64,
    /// Number of physical frames
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    nframes: u64,
    /// Frame replacement policy
    #[arg(value_enum)]
    policy: Policy,
    /// Synthetic access program to run
    #[arg(value_enum)]
    program: Program,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Rand,
    Fifo,
    Custom,
}

#[derive(Clone, Copy, ValueEnum)]
enum Program {
    Alpha,
    Beta,
    Gamma,
    Delta,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let result = match args.policy {
        Policy::Rand => run(&args, Random),
        Policy::Fifo => run(&args, Fifo),
        Policy::Custom => run(&args, Clock::new()),
    };
    if let Err(e) = result {
        eprintln!("virtmem: {e:#}");
        process::exit(1);
    }
}

fn run<P: ReplacementPolicy>(args: &Args, policy: P) -> Result<()> {
    let npages = args.npages as usize;
    let nframes = args.nframes as usize;

    let disk = Disk::create(Path::new(DISK_PATH), npages)?;
    let mut kernel = Kernel::new(npages, nframes, policy, disk);

    let checksum = match args.program {
        Program::Alpha => program::alpha(&mut kernel),
        Program::Beta => program::beta(&mut kernel),
        Program::Gamma => program::gamma(&mut kernel),
        Program::Delta => program::delta(&mut kernel),
    }?;

    print_report(&kernel.mm.stats, checksum);

    Ok(())
}

fn print_report(stats: &MemoryStats, checksum: u32) {
    print_row_header("## Execution summary");
    print_row("Page faults", &stats.page_faults);
    print_row("Disk reads", &stats.disk_reads);
    print_row("Disk writes", &stats.disk_writes);
    print_row("Checksum", &format!("{checksum:#010x}"));
}

fn print_row_header(title: &str) {
    println!("{}", title);
    println!("| {:<20} | {:<20} |", "Metric", "Value");
    println!("| {:-<20} | {:-<20} |", "-", "-");
}

fn print_row(label: &str, value: &dyn std::fmt::Display) {
    println!("| {:<20} | {:<20} |", label, value);
}
