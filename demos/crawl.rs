//! # Example: crawl
//!
//! Crawls a fake map server's catalog as a lazily expanded task graph:
//! workspaces → stores → layers → layer details → service probes.
//!
//! Shows how to:
//! - Implement [`Task`] for a domain enum and wire children through a [`FanOut`] table.
//! - Keep collaborator caches (a TTL'd server version) inside the context.
//! - Get transient failures retried in rounds and permanent ones failed at once.
//! - Stream report rows (stdout) and warning rows (stderr) as JSON lines.
//!
//! ## Flow
//! ```text
//! Workspaces ──► Stores(ws) ──► Layers(ws, store) ──► Layer(ws, name) ──► Probe(ws, name)
//!                                                       │                 (geometry only)
//!                                                       ├─ "legacy": unsupported style → Failed
//!                                                       └─ "rivers" probe: refused twice → retried
//! every kind ──► ReportSink (JSON lines)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example crawl
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use taskgraph::{
    BackoffPolicy, BoxTask, Domain, FanOut, JsonLinesWriter, LogWriter, Lookup, Param,
    ReportSink, Runner, RunnerConfig, Subscribe, Task, TaskError, Warning,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ---- Fake collaborator ----

#[derive(Clone, Debug)]
struct LayerInfo {
    name: String,
    style: String,
    geometry: Option<String>,
    enabled: bool,
}

/// Server version cached for `ttl`; refreshed by whoever asks first after expiry.
struct VersionCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, String)>>,
    fetches: AtomicU32,
}

impl VersionCache {
    fn get(&self, fetch: impl FnOnce() -> String) -> String {
        let mut slot = self.slot.lock();
        if let Some((at, version)) = slot.as_ref() {
            if at.elapsed() < self.ttl {
                return version.clone();
            }
        }
        let version = fetch();
        self.fetches.fetch_add(1, Ordering::Relaxed);
        *slot = Some((Instant::now(), version.clone()));
        version
    }
}

/// In-memory stand-in for the map server's REST API.
struct GisClient {
    catalog: HashMap<String, HashMap<String, Vec<LayerInfo>>>,
    version: VersionCache,
    refusals: Mutex<HashMap<String, u32>>,
}

impl GisClient {
    fn demo() -> Self {
        let layer = |name: &str, style: &str, geometry: Option<&str>, enabled: bool| LayerInfo {
            name: name.to_string(),
            style: style.to_string(),
            geometry: geometry.map(str::to_string),
            enabled,
        };
        let mut topp = HashMap::new();
        topp.insert(
            "states_shapefile".to_string(),
            vec![
                layer("states", "population", Some("MultiPolygon"), true),
                layer("legacy", "sld10", Some("Point"), true),
            ],
        );
        topp.insert(
            "hydro".to_string(),
            vec![
                layer("rivers", "line", Some("LineString"), true),
                layer("legend", "raster", None, false),
            ],
        );
        let mut sf = HashMap::new();
        sf.insert(
            "sfdem".to_string(),
            vec![layer("dem", "dem", None, true)],
        );

        let mut catalog = HashMap::new();
        catalog.insert("topp".to_string(), topp);
        catalog.insert("sf".to_string(), sf);

        Self {
            catalog,
            version: VersionCache {
                ttl: Duration::from_secs(30),
                slot: Mutex::new(None),
                fetches: AtomicU32::new(0),
            },
            refusals: Mutex::new(HashMap::from([("rivers".to_string(), 2)])),
        }
    }

    fn server_version(&self) -> String {
        self.version.get(|| "2.25.1".to_string())
    }

    fn workspaces(&self) -> Result<Vec<String>, TaskError> {
        let mut names: Vec<String> = self.catalog.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn stores(&self, ws: &str) -> Lookup<Vec<String>> {
        match self.catalog.get(ws) {
            Some(stores) => {
                let mut names: Vec<String> = stores.keys().cloned().collect();
                names.sort();
                Lookup::Found(names)
            }
            None => Lookup::NotFound,
        }
    }

    fn layers(&self, ws: &str, store: &str) -> Lookup<Vec<String>> {
        match self.catalog.get(ws).and_then(|s| s.get(store)) {
            Some(layers) => Lookup::Found(layers.iter().map(|l| l.name.clone()).collect()),
            None => Lookup::NotFound,
        }
    }

    fn layer(&self, ws: &str, name: &str) -> Lookup<LayerInfo> {
        let found = self
            .catalog
            .get(ws)
            .into_iter()
            .flat_map(|stores| stores.values().flatten())
            .find(|l| l.name == name);
        match found {
            Some(info) if info.style == "sld10" => {
                Lookup::Error(TaskError::fail(format!("Unsupported style '{}'", info.style)))
            }
            Some(info) => Lookup::Found(info.clone()),
            None => Lookup::NotFound,
        }
    }

    fn get_map(&self, ws: &str, name: &str) -> Result<u16, TaskError> {
        let version = self.server_version();
        let mut refusals = self.refusals.lock();
        if let Some(left) = refusals.get_mut(name).filter(|n| **n > 0) {
            *left -= 1;
            return Err(TaskError::connection(format!(
                "GetMap {ws}:{name} (wms {version}): connection refused"
            )));
        }
        Ok(200)
    }
}

// ---- Task graph ----

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Workspaces,
    Stores,
    Layers,
    Layer,
    Probe,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Kind::Workspaces => "workspaces",
            Kind::Stores => "stores",
            Kind::Layers => "layers",
            Kind::Layer => "layer",
            Kind::Probe => "probe",
        })
    }
}

#[derive(Debug)]
enum Found {
    Names { workspace: String, names: Vec<String> },
    Layer { workspace: String, info: LayerInfo },
    Status(u16),
}

struct Gis;

impl Domain for Gis {
    type Context = GisClient;
    type Kind = Kind;
    type Output = Found;
}

enum Step {
    Workspaces,
    Stores { ws: String },
    Layers { ws: String, store: String },
    Layer { ws: String, name: String },
    Probe { ws: String, name: String },
}

impl Step {
    fn boxed(self) -> BoxTask<Gis> {
        Box::new(self)
    }
}

impl Task<Gis> for Step {
    fn kind(&self) -> Kind {
        match self {
            Step::Workspaces => Kind::Workspaces,
            Step::Stores { .. } => Kind::Stores,
            Step::Layers { .. } => Kind::Layers,
            Step::Layer { .. } => Kind::Layer,
            Step::Probe { .. } => Kind::Probe,
        }
    }

    fn params(&self) -> Vec<Param> {
        match self {
            Step::Workspaces => Vec::new(),
            Step::Stores { ws } => vec![Param::new("workspace", ws)],
            Step::Layers { ws, store } => {
                vec![Param::new("workspace", ws), Param::new("store", store)]
            }
            Step::Layer { ws, name } | Step::Probe { ws, name } => {
                vec![Param::new("workspace", ws), Param::new("layer", name)]
            }
        }
    }

    fn exec(&mut self, client: &GisClient) -> Result<Found, TaskError> {
        match self {
            Step::Workspaces => Ok(Found::Names {
                workspace: String::new(),
                names: client.workspaces()?,
            }),
            Step::Stores { ws } => Ok(Found::Names {
                workspace: ws.clone(),
                names: client.stores(ws).require(format!("workspace {ws}"))?,
            }),
            Step::Layers { ws, store } => Ok(Found::Names {
                workspace: ws.clone(),
                names: client
                    .layers(ws, store)
                    .require(format!("store {ws}:{store}"))?,
            }),
            Step::Layer { ws, name } => Ok(Found::Layer {
                workspace: ws.clone(),
                info: client.layer(ws, name).require(format!("layer {ws}:{name}"))?,
            }),
            Step::Probe { ws, name } => client.get_map(ws, name).map(Found::Status),
        }
    }

    fn warnings(&self, output: &Found) -> Vec<Warning> {
        match output {
            Found::Layer { info, .. } if !info.enabled => {
                vec![Warning::warning(format!("layer {} is disabled", info.name))]
            }
            Found::Names { names, .. } if names.is_empty() => {
                vec![Warning::warning("empty listing")]
            }
            _ => Vec::new(),
        }
    }

    fn format_result(&self, output: &Found) -> String {
        match output {
            Found::Names { names, .. } => names.join(","),
            Found::Layer { info, .. } => format!(
                "style={} geometry={}",
                info.style,
                info.geometry.as_deref().unwrap_or("-")
            ),
            Found::Status(code) => format!("HTTP {code}"),
        }
    }
}

fn fan_out(sink: &Arc<ReportSink>) -> Arc<FanOut<Gis>> {
    FanOut::<Gis>::builder()
        .children(Kind::Workspaces, |out: &Found| match out {
            Found::Names { names, .. } => names
                .iter()
                .map(|ws| Step::Stores { ws: ws.clone() }.boxed())
                .collect(),
            _ => Vec::new(),
        })
        .children(Kind::Stores, |out: &Found| match out {
            Found::Names { workspace, names } => names
                .iter()
                .map(|store| {
                    Step::Layers {
                        ws: workspace.clone(),
                        store: store.clone(),
                    }
                    .boxed()
                })
                .collect(),
            _ => Vec::new(),
        })
        .children(Kind::Layers, |out: &Found| match out {
            Found::Names { workspace, names } => names
                .iter()
                .map(|name| {
                    Step::Layer {
                        ws: workspace.clone(),
                        name: name.clone(),
                    }
                    .boxed()
                })
                .collect(),
            _ => Vec::new(),
        })
        .children(Kind::Layer, |out: &Found| match out {
            Found::Layer { workspace, info } if info.geometry.is_some() => vec![
                Step::Probe {
                    ws: workspace.clone(),
                    name: info.name.clone(),
                }
                .boxed(),
            ],
            _ => Vec::new(),
        })
        .on_every(sink.action())
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut cfg = RunnerConfig::default();
    cfg.workers = 4;
    cfg.thread_name = "crawl".into();
    cfg.backoff = BackoffPolicy::constant(Duration::from_millis(200));

    let sink = ReportSink::for_workers(
        cfg.workers_clamped(),
        JsonLinesWriter::new(io::stdout()),
        JsonLinesWriter::new(io::stderr()),
    );

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let client = Arc::new(GisClient::demo());

    let mut runner = Runner::builder(cfg, Arc::clone(&client))
        .with_fan_out(fan_out(&sink))
        .with_subscribers(subs)
        .build();
    runner.add_task(Step::Workspaces);
    runner.start()?;

    let summary = runner.wait_to_shutdown()?;
    sink.flush()?;
    tracing::info!(
        %summary,
        report_rows = sink.report_rows(),
        warning_rows = sink.warning_rows(),
        version_fetches = client.version.fetches.load(Ordering::Relaxed),
        "crawl finished"
    );
    Ok(())
}
