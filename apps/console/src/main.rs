mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    EvidencePhoto, FinishForm, HttpFleetApi, NotificationRelay, ProjectionCache, RosterManager,
    StartForm, TripApi, TripPhase, TripSession, ValidationError, WashForm,
};
use serde::Serialize;
use shared::{
    domain::{TripId, TripScope, VehicleFilter, VehicleId},
    protocol::Trip,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleet-console", about = "Trip lifecycle console for the fleet backend")]
struct Args {
    /// Overrides api_url from fleet.toml / FLEET_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    token: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Print lists as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    Profile,
    Vehicles {
        #[arg(long, value_enum, default_value_t = FilterArg::Active)]
        filter: FilterArg,
    },
    Trips {
        #[arg(long, value_enum, default_value_t = ScopeArg::Active)]
        scope: ScopeArg,
    },
    Start {
        vehicle: i64,
        odometer: f64,
        #[arg(long)]
        fuel: Option<f64>,
        #[arg(long = "odometer-photo")]
        odometer_photos: Vec<PathBuf>,
        #[arg(long = "fuel-photo")]
        fuel_photos: Vec<PathBuf>,
    },
    /// Finalize an open trip, recording a wash first when one is due.
    Finish {
        trip: i64,
        odometer: f64,
        #[arg(long)]
        fuel: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "odometer-photo")]
        odometer_photos: Vec<PathBuf>,
        #[arg(long = "fuel-photo")]
        fuel_photos: Vec<PathBuf>,
        #[arg(long = "wash-photo")]
        wash_photos: Vec<PathBuf>,
    },
    /// Record a wash for a trip whose vehicle hit its wash cycle.
    Wash {
        trip: i64,
        #[arg(long = "wash-photo", required = true)]
        wash_photos: Vec<PathBuf>,
    },
    /// Trips still waiting on a wash, open or finalized.
    PendingWash {
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },
    Evidence {
        #[arg(long, conflicts_with = "vehicle", required_unless_present = "vehicle")]
        trip: Option<i64>,
        #[arg(long)]
        vehicle: Option<i64>,
    },
    Summary,
    Users,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    Active,
    Inactive,
    All,
}

impl From<FilterArg> for VehicleFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::Active => VehicleFilter::Active,
            FilterArg::Inactive => VehicleFilter::Inactive,
            FilterArg::All => VehicleFilter::All,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScopeArg {
    Active,
    All,
    Mine,
    MineActive,
}

impl From<ScopeArg> for TripScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Active => TripScope::Active,
            ScopeArg::All => TripScope::All,
            ScopeArg::Mine => TripScope::Mine,
            ScopeArg::MineActive => TripScope::MineActive,
        }
    }
}

struct Console {
    api: Arc<HttpFleetApi>,
    cache: Arc<ProjectionCache>,
    relay: Arc<NotificationRelay>,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings()?;
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = args.token {
        settings.token = Some(token);
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.timeout_secs = timeout_secs;
    }
    settings.validate()?;
    info!(api_url = %settings.api_url, "console: starting");

    let api = Arc::new(HttpFleetApi::with_timeout(&settings.api_url, settings.timeout())?);
    if let Some(token) = settings.token.clone() {
        api.set_token(token).await;
    }
    let trip_api: Arc<dyn TripApi> = api.clone();
    let console = Console {
        cache: Arc::new(ProjectionCache::new(trip_api)),
        relay: Arc::new(NotificationRelay::new(settings.toast_duration())),
        api,
        json: args.json,
    };

    let outcome = console.run(args.command).await;
    for entry in console.relay.drain() {
        println!("[{}] {}", entry.severity, entry.message);
    }
    outcome
}

impl Console {
    fn session(&self) -> Arc<TripSession> {
        TripSession::new(self.api.clone(), self.cache.clone(), self.relay.clone())
    }

    fn roster(&self) -> RosterManager {
        RosterManager::new(self.api.clone(), self.cache.clone(), self.relay.clone())
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, password } => {
                let user = self.api.login(&email, &password).await?;
                println!("Logged in as {} <{}>", user.name, user.email);
                if let Some(session) = self.api.session().await {
                    println!("export FLEET_TOKEN={}", session.token);
                }
            }
            Command::Profile => {
                let profile = self.roster().profile().await?;
                self.print(&profile, |p| {
                    format!("{:>4}  {}  <{}>  admin={}", p.id, p.name, p.email, p.is_admin)
                })?;
            }
            Command::Vehicles { filter } => {
                let vehicles = self.roster().vehicles(filter.into()).await?;
                self.print_list(&vehicles, |v| {
                    format!(
                        "{:>4}  {:<10} {:<14} {:>10.1} km{}",
                        v.id,
                        v.plate,
                        v.status,
                        v.current_odometer,
                        if v.requires_wash { "  [wash due]" } else { "" }
                    )
                })?;
            }
            Command::Trips { scope } => {
                let trips = self.cache.trips(scope.into()).await?;
                self.print_list(&trips, trip_line)?;
            }
            Command::PendingWash { scope } => {
                let trips = self.cache.trips_awaiting_wash(scope.into()).await?;
                self.print_list(&trips, trip_line)?;
            }
            Command::Wash { trip, wash_photos } => {
                let wash = WashForm::new(load_photos(&wash_photos).await?);
                let uploaded = self.session().record_wash(TripId(trip), wash).await?;
                info!(trip_id = trip, uploaded, "console: wash recorded");
            }
            Command::Start {
                vehicle,
                odometer,
                fuel,
                odometer_photos,
                fuel_photos,
            } => {
                let mut form = StartForm::new(VehicleId(vehicle), odometer)
                    .with_odometer_photos(load_photos(&odometer_photos).await?)
                    .with_fuel_photos(load_photos(&fuel_photos).await?);
                if let Some(level) = fuel {
                    form = form.with_fuel(level);
                }
                let session = self.session();
                let phase = session.start(form).await;
                if phase != TripPhase::Active {
                    bail!("trip was not started ({phase})");
                }
                if let Some(trip) = session.trip().await {
                    println!("trip {} active", trip.id);
                }
            }
            Command::Finish {
                trip,
                odometer,
                fuel,
                notes,
                odometer_photos,
                fuel_photos,
                wash_photos,
            } => {
                let mut form = FinishForm::new(odometer)
                    .with_odometer_photos(load_photos(&odometer_photos).await?)
                    .with_fuel_photos(load_photos(&fuel_photos).await?);
                if let Some(level) = fuel {
                    form = form.with_fuel(level);
                }
                if let Some(notes) = notes {
                    form = form.with_notes(notes);
                }
                let wash = WashForm::new(load_photos(&wash_photos).await?);
                self.finish(TripId(trip), form, wash).await?;
            }
            Command::Evidence { trip, vehicle } => {
                let assets = match (trip, vehicle) {
                    (Some(trip), _) => self.api.list_trip_evidence(TripId(trip)).await?,
                    (None, Some(vehicle)) => {
                        self.roster().vehicle_evidence(VehicleId(vehicle)).await?
                    }
                    (None, None) => bail!("pass --trip or --vehicle"),
                };
                self.print_list(&assets, |a| {
                    format!(
                        "{:>5}  {:<17} {}",
                        a.id,
                        a.purpose,
                        a.file_name.as_deref().unwrap_or(&a.url)
                    )
                })?;
            }
            Command::Summary => {
                let summary = self.roster().fleet_summary().await?;
                self.print(&summary, |s| {
                    format!(
                        "total {}  available {}  in use {}  maintenance {}  blocked {}  wash due {}",
                        s.total, s.available, s.in_use, s.maintenance, s.blocked, s.requiring_wash
                    )
                })?;
            }
            Command::Users => {
                let users = self.roster().users().await?;
                self.print_list(&users, |u| {
                    format!(
                        "{:>4}  {:<20} {:<28} {}",
                        u.id,
                        u.name,
                        u.email,
                        if u.active { "" } else { "inactive" }
                    )
                })?;
            }
        }
        Ok(())
    }

    async fn finish(&self, trip_id: TripId, form: FinishForm, wash: WashForm) -> Result<()> {
        let session = self.session();
        if session.resume(trip_id).await != TripPhase::Active {
            bail!("trip {trip_id} is not open");
        }

        let mut phase = session.request_finalize(form.clone()).await;
        if phase == TripPhase::WashRequired {
            if wash.photos.is_empty() {
                bail!("trip {trip_id} needs a wash first; pass --wash-photo");
            }
            phase = session.submit_wash(wash).await;
            if phase == TripPhase::Active {
                phase = session.request_finalize(form).await;
            }
        }

        if phase != TripPhase::Finalized {
            bail!("trip {trip_id} was not finalized ({phase})");
        }
        Ok(())
    }

    fn print<T: Serialize>(&self, value: &T, line: impl Fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", line(value));
        }
        Ok(())
    }

    fn print_list<T: Serialize>(&self, values: &[T], line: impl Fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(values)?);
        } else if values.is_empty() {
            println!("(none)");
        } else {
            for value in values {
                println!("{}", line(value));
            }
        }
        Ok(())
    }
}

fn trip_line(trip: &Trip) -> String {
    let plate = trip
        .vehicle
        .as_ref()
        .map(|v| v.plate.clone())
        .unwrap_or_else(|| trip.vehicle_id.to_string());
    let end = trip
        .end_odometer
        .map(|km| format!("{km:.1}"))
        .unwrap_or_else(|| "open".to_string());
    let wash = if trip.awaits_wash() { "  [wash due]" } else { "" };
    format!("{:>5}  {:<10} {:>10.1} -> {:>10}{wash}", trip.id, plate, trip.start_odometer, end)
}

async fn load_photos(paths: &[PathBuf]) -> Result<Vec<EvidencePhoto>> {
    let mut photos = Vec::with_capacity(paths.len());
    for path in paths {
        let photo = EvidencePhoto::from_path(path).await?;
        if !photo.is_image() {
            return Err(ValidationError::NotAnImage(photo.file_name).into());
        }
        photos.push(photo);
    }
    Ok(photos)
}
