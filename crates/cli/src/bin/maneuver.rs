use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use orbital_maneuvers::common::constants::MU_EARTH;
use orbital_maneuvers::common::time::days_to_seconds;
use orbital_maneuvers::config::{load_planner, load_scenario};
use orbital_maneuvers::export::{self, patches as export_patches, plan as export_plan};
use orbital_maneuvers::impulsive::{CourseTarget, TransferPath, hohmann};
use orbital_maneuvers::orbits::{Orbit, OrbitalElements, PatchTransition, predict_patches};
use orbital_maneuvers::transfer::{
    PlannerSettings, Scenario, TransferMode, TransferRequest, plan_course_correction, plan_hohmann_window,
    plan_transfer,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Impulsive orbital maneuver planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analytic Hohmann transfer between coplanar circular orbits and its next window
    Hohmann(HohmannArgs),
    /// Annealed two-burn transfer between the scenario's vessel and target
    Transfer(TransferArgs),
    /// Patched-conic timeline of the scenario's vessel orbit
    Patches(PatchesArgs),
    /// Cheapest burn that puts the scenario's vessel on the target at a chosen epoch
    Correct(CorrectArgs),
}

#[derive(Args)]
struct HohmannArgs {
    /// Gravitational parameter of the central body in km^3/s^2
    #[arg(long, default_value_t = MU_EARTH)]
    mu: f64,

    /// Radius of the departure orbit in km
    #[arg(long)]
    r1: f64,

    /// Radius of the target orbit in km
    #[arg(long)]
    r2: f64,

    /// Current lead of the target over the vessel in degrees
    #[arg(long, default_value_t = 0.0)]
    phase_deg: f64,

    /// Search start epoch in seconds
    #[arg(long, default_value_t = 0.0)]
    epoch: f64,

    /// Planner settings file (YAML or TOML) for the window search
    #[arg(long)]
    planner: Option<PathBuf>,
}

#[derive(Args)]
struct TransferArgs {
    /// Scenario file (YAML or TOML)
    #[arg(long)]
    scenario: PathBuf,

    /// Seed for the annealing random walk (overrides the scenario)
    #[arg(long)]
    seed: Option<u64>,

    /// Pin the departure burn to the scenario epoch
    #[arg(long, default_value_t = false)]
    burn_now: bool,

    /// Skip the velocity-matching arrival burn
    #[arg(long, default_value_t = false)]
    intercept_only: bool,

    /// Write the plan as JSON to this path (`-` for stdout)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PatchesArgs {
    /// Scenario file (YAML or TOML)
    #[arg(long)]
    scenario: PathBuf,

    /// Search horizon after the scenario epoch in days
    #[arg(long, default_value_t = 30.0)]
    horizon_days: f64,

    /// CSV output path (`-` for stdout)
    #[arg(long, default_value = "-")]
    output: PathBuf,
}

#[derive(Args)]
struct CorrectArgs {
    /// Scenario file (YAML or TOML)
    #[arg(long)]
    scenario: PathBuf,

    /// Meeting time after the scenario epoch in hours
    #[arg(long)]
    arrival_hours: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Hohmann(args) => run_hohmann(&args),
        Command::Transfer(args) => run_transfer(&args),
        Command::Patches(args) => run_patches(&args),
        Command::Correct(args) => run_correct(&args),
    }
}

fn circular(mu: f64, radius: f64, anomaly: f64, epoch: f64) -> anyhow::Result<Orbit> {
    let orbit = Orbit::from_elements(
        mu,
        &OrbitalElements {
            semi_major_axis: radius,
            eccentricity: 0.0,
            inclination: 0.0,
            longitude_of_ascending_node: 0.0,
            argument_of_periapsis: 0.0,
            true_anomaly: anomaly,
        },
        epoch,
    )?;
    Ok(orbit)
}

fn run_hohmann(args: &HohmannArgs) -> anyhow::Result<()> {
    let analytic = hohmann(args.r1, args.r2, args.mu)?;
    println!(
        "Hohmann Δv     : dv1 = {:.4} km/s, dv2 = {:.4} km/s, total = {:.4} km/s",
        analytic.departure_delta_v, analytic.arrival_delta_v, analytic.total_delta_v
    );
    println!(
        "Transfer time  : {:.1} s ({:.3} h)",
        analytic.transfer_time,
        analytic.transfer_time / 3_600.0
    );
    println!("Phase angle    : {:.3} deg", analytic.phase_angle.to_degrees());

    let settings = match &args.planner {
        Some(path) => {
            let config = load_planner(path).with_context(|| format!("loading planner {}", path.display()))?;
            PlannerSettings::from_config(&config)
        }
        None => PlannerSettings::default(),
    };
    let vessel = circular(args.mu, args.r1, 0.0, args.epoch)?;
    let target = circular(args.mu, args.r2, args.phase_deg.to_radians(), args.epoch)?;
    let window = plan_hohmann_window(&vessel, &target, args.epoch, &settings)
        .context("searching for the next Hohmann window")?;
    println!(
        "Next window    : t = {:.1} s, |Δv| = {:.4} km/s, arrival t = {:.1} s",
        window.burn.epoch,
        window.burn.magnitude(),
        window.arrival_epoch
    );
    Ok(())
}

fn run_transfer(args: &TransferArgs) -> anyhow::Result<()> {
    let config = load_scenario(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    let scenario = Scenario::from_config(&config)?;
    if scenario.vessel_body != scenario.target_body {
        bail!(
            "vessel orbits {} but target orbits {}; two-burn transfers need a common central body",
            scenario.body_name(scenario.vessel_body),
            scenario.body_name(scenario.target_body)
        );
    }

    let seed = args
        .seed
        .or(scenario.settings.seed)
        .unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let request = TransferRequest {
        mode: if args.intercept_only {
            TransferMode::InterceptOnly
        } else {
            TransferMode::Rendezvous
        },
        burn_now: args.burn_now,
        ..TransferRequest::default()
    };
    info!(seed, scenario = %args.scenario.display(), "planning transfer");
    let plan = plan_transfer(
        &scenario.vessel,
        &scenario.target,
        scenario.epoch,
        &request,
        &scenario.settings,
        &mut rng,
    )?;

    println!("Seed           : {seed}");
    println!(
        "Departure      : t = {:.1} s, |Δv| = {:.4} km/s",
        plan.departure.epoch,
        plan.departure.magnitude()
    );
    if let Some(arrival) = &plan.arrival {
        println!(
            "Arrival        : t = {:.1} s, |Δv| = {:.4} km/s",
            arrival.epoch,
            arrival.magnitude()
        );
    }
    println!("Total Δv       : {:.4} km/s", plan.cost);
    println!("Transfer time  : {:.1} s", plan.transfer_time);
    if plan.cost >= scenario.settings.optimizer.infeasible_cost {
        bail!("no feasible transfer found within the search bounds");
    }

    if let Some(path) = &args.output {
        let body = scenario.body_name(scenario.vessel_body).to_string();
        let record = export_plan::BurnPlanRecord {
            origin: body.clone(),
            destination: body,
            departure: export_plan::BurnRecord::new(plan.departure.epoch, plan.departure.delta_v),
            arrival: plan
                .arrival
                .map(|burn| export_plan::BurnRecord::new(burn.epoch, burn.delta_v)),
            total_delta_v_km_s: plan.cost,
            transfer_time_s: plan.transfer_time,
            lambert_path: match plan.path {
                TransferPath::Short => "short".into(),
                TransferPath::Long => "long".into(),
            },
            iterations: plan.iterations,
            seed,
        };
        export_plan::write_plan(path, &record)?;
        info!(path = %path.display(), "plan written");
    }
    Ok(())
}

fn run_patches(args: &PatchesArgs) -> anyhow::Result<()> {
    if !(args.horizon_days > 0.0) {
        bail!("horizon must be positive, got {} days", args.horizon_days);
    }
    let config = load_scenario(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    let scenario = Scenario::from_config(&config)?;
    let horizon = scenario.epoch + days_to_seconds(args.horizon_days);
    let patches = predict_patches(
        &scenario.system,
        scenario.vessel_body,
        &scenario.vessel,
        horizon,
        None,
        &scenario.settings.patches,
    )?;

    let mut writer = export::writer_for_path(&args.output)?;
    export_patches::write_header(writer.as_mut())?;
    for (index, patch) in patches.iter().enumerate() {
        let transition = match patch.transition {
            PatchTransition::Escape => "escape".to_string(),
            PatchTransition::Encounter(id) => format!("encounter:{}", scenario.body_name(id)),
            PatchTransition::EndOfWindow => "end_of_window".to_string(),
            PatchTransition::Final => "final".to_string(),
        };
        export_patches::Record {
            index,
            body: scenario.body_name(patch.body),
            start_epoch_s: patch.start_epoch,
            end_epoch_s: patch.end_epoch,
            transition: &transition,
            semi_major_axis_km: patch.orbit.semi_major_axis(),
            eccentricity: patch.orbit.eccentricity(),
            periapsis_km: patch.orbit.periapsis(),
        }
        .write_to(writer.as_mut())?;
    }
    writer.flush()?;
    info!(patches = patches.len(), "patch timeline written");
    Ok(())
}

fn run_correct(args: &CorrectArgs) -> anyhow::Result<()> {
    if !(args.arrival_hours > 0.0) {
        bail!("arrival must follow the scenario epoch, got {} h", args.arrival_hours);
    }
    let config = load_scenario(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    let scenario = Scenario::from_config(&config)?;
    if scenario.vessel_body != scenario.target_body {
        bail!(
            "vessel orbits {} but target orbits {}; course corrections need a common central body",
            scenario.body_name(scenario.vessel_body),
            scenario.body_name(scenario.target_body)
        );
    }

    let closest_approach = scenario.epoch + args.arrival_hours * 3_600.0;
    let burn = plan_course_correction(
        &scenario.vessel,
        scenario.epoch,
        &CourseTarget::Vessel(scenario.target),
        closest_approach,
        &scenario.settings,
    )?;
    println!(
        "Correction     : t = {:.1} s, |Δv| = {:.4} km/s",
        burn.epoch,
        burn.magnitude()
    );
    println!(
        "Δv vector      : [{:.5}, {:.5}, {:.5}] km/s",
        burn.delta_v[0], burn.delta_v[1], burn.delta_v[2]
    );
    Ok(())
}
