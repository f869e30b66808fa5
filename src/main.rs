mod race;

use clap::Parser;

#[derive(Parser)]
#[command(name = "math_rally")]
#[command(about = "Headless quiz-racing simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.05")]
    delta: f32,

    /// Number of bot cars
    #[arg(long, default_value = "8")]
    bots: usize,

    /// Number of lanes on the track
    #[arg(long, default_value = "4")]
    lanes: usize,

    /// Track centerline length in world units
    #[arg(long, default_value = "1200.0")]
    track_length: f32,

    /// RNG seed; the same seed replays the same race
    #[arg(long, default_value = "0")]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    println!("Running race simulation in headless mode...");
    println!(
        "Ticks: {}, Delta: {}s, Bots: {}, Lanes: {}, Track: {}",
        cli.ticks, cli.delta, cli.bots, cli.lanes, cli.track_length
    );

    // Calculate how many ticks equal 1 second of simulation time
    let ticks_per_second = (1.0 / cli.delta).ceil() as u32;
    println!("Running {} ticks per second (simulated time)", ticks_per_second);
    println!();

    let mut world =
        race::RaceWorld::create_test_race(cli.bots, cli.lanes, cli.track_length, cli.seed)?;

    println!("Initial state:");
    world.print_summary();
    println!();

    let mut tick = 0;
    while tick < cli.ticks {
        let ticks_to_run = ticks_per_second.min(cli.ticks - tick);

        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(cli.delta);
        }

        // Print summary after running 1 second worth of ticks
        println!(
            "--- After tick {} ({:.1}s simulated time) ---",
            tick,
            tick as f32 * cli.delta
        );
        world.print_summary();
        println!();
    }

    println!("=== Final State ===");
    world.print_summary();
    Ok(())
}
