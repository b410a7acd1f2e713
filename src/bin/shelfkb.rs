//! shelfkb command line
//!
//! Validates layout files and previews the queries the knowledge base
//! sends for a perception result. Previews run the real knowledge base
//! against a scripted reasoner that records every query.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfkb::query::{self, MAP};
use shelfkb::{
    KbConfig, KbResult, KnowledgeBase, LayoutConfig, PoseStamped, ScriptedReasoner, ScriptedRule,
    ShelfEntry, Side, Solution, StaticTransforms, Term,
};

#[derive(Parser)]
#[command(name = "shelfkb")]
#[command(about = "Shelf perception knowledge base tools", long_about = None)]
struct Cli {
    /// Wrapper settings (YAML or JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a layout file and print the visiting order
    Layout {
        /// Path to the layout file
        file: PathBuf,
    },

    /// Print the queries sent for a perception result
    Query {
        #[command(subcommand)]
        kind: QueryKind,
    },
}

#[derive(Subcommand)]
enum QueryKind {
    /// Layer heights perceived on a shelf system
    Layers {
        /// Shelf system id
        shelf: String,

        /// Layer heights in meters (comma-separated)
        #[arg(value_delimiter = ',', required = true)]
        heights: Vec<f64>,

        /// Layer class the reasoner reports for the bottom layer
        #[arg(long, default_value = "dmshop:DMFloorBottomT5")]
        bottom_type: String,

        /// Layer class the reasoner reports for the other layers
        #[arg(long, default_value = "dmshop:DMFloorT5W100")]
        layer_type: String,

        /// Mark the shelf as one depth class deeper than reported
        #[arg(long)]
        hack: bool,
    },

    /// Separators and labels perceived on a shelf layer
    Separators {
        /// Shelf layer id
        layer: String,

        /// Layer width in meters
        #[arg(short, long, default_value_t = 1.0)]
        width: f64,

        /// Separator positions in meters from the layer's left edge (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        separators: Vec<f64>,

        /// Labels as POSITION=DAN, positions in meters from the left edge
        #[arg(short, long, value_delimiter = ',', value_parser = parse_label)]
        labels: Vec<(f64, String)>,
    },
}

fn parse_label(s: &str) -> Result<(f64, String), String> {
    let (pos, dan) = s
        .split_once('=')
        .ok_or_else(|| format!("expected POSITION=DAN, got {s:?}"))?;
    let pos = pos
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid label position {pos:?}: {e}"))?;
    Ok((pos, dan.trim().to_string()))
}

fn layout_report(file: &Path) -> KbResult<Vec<String>> {
    let layout = LayoutConfig::load(file)?;
    let mut lines = vec![format!("{} shelf systems in {}", layout.len(), file.display())];
    for (idx, (id, entry)) in layout.entries().enumerate() {
        let side = match entry.side {
            Side::Left => "left",
            Side::Right => "right",
        };
        lines.push(format!(
            "{:>3}. {id:<32} {side:<5} via-points: {:<3} from: {}{}",
            idx + 1,
            entry.via_points.len(),
            entry.starting_point.as_deref().unwrap_or("-"),
            if entry.hack { "  (depth hack)" } else { "" },
        ));
    }
    Ok(lines)
}

type DryRun = KnowledgeBase<Arc<ScriptedReasoner>, StaticTransforms>;

fn dry_run(config: KbConfig) -> (DryRun, Arc<ScriptedReasoner>) {
    let reasoner = Arc::new(ScriptedReasoner::new());
    let kb = KnowledgeBase::new(
        Arc::clone(&reasoner),
        StaticTransforms::new(),
        config.without_settling(),
    );
    (kb, reasoner)
}

fn answer(reasoner: &ScriptedReasoner, q: String, variable: &str, term: Term) -> KbResult<()> {
    reasoner.add_rule(ScriptedRule::exact(q).solution(Solution::new().with(variable, term)))?;
    Ok(())
}

fn preview_layers(
    config: KbConfig,
    shelf: &str,
    heights: &[f64],
    bottom_type: &str,
    layer_type: &str,
    hack: bool,
) -> KbResult<Vec<String>> {
    let mut layout = config.load_layout();
    let listed_hack = layout.has_depth_hack(shelf);
    let side = layout.entry(shelf).map_or(Side::Left, |e| e.side);
    layout.push(
        shelf,
        ShelfEntry {
            side,
            starting_point: None,
            via_points: Vec::new(),
            hack: hack || listed_hack,
        },
    );

    let (kb, reasoner) = dry_run(config);
    let kb = kb.with_layout(layout);
    answer(&reasoner, query::bottom_floor_type(shelf), "LayerType", Term::Atom(query::atom(bottom_type)))?;
    answer(&reasoner, query::floor_type(shelf), "LayerType", Term::Atom(query::atom(layer_type)))?;

    kb.add_shelf_layers(shelf, heights)?;
    Ok(reasoner.queries())
}

fn preview_separators(
    config: KbConfig,
    layer: &str,
    width: f64,
    separators: &[f64],
    labels: &[(f64, String)],
) -> KbResult<Vec<String>> {
    let (kb, reasoner) = dry_run(config);
    let feature_frame = format!("{layer}_feature");
    answer(&reasoner, query::perceived_frame(layer), "FeatureFrame", Term::Atom(query::atom(&feature_frame)))?;
    answer(&reasoner, query::object_dimensions(layer), "W", Term::Float(width))?;
    kb.transforms()
        .insert_frame(&feature_frame, &PoseStamped::at(MAP, 0.0, 0.0, 0.0))?;

    let separators: Vec<PoseStamped> = separators
        .iter()
        .map(|x| PoseStamped::at(MAP, *x, 0.0, 0.0))
        .collect();
    let barcodes: Vec<(String, PoseStamped)> = labels
        .iter()
        .map(|(x, dan)| (dan.clone(), PoseStamped::at(MAP, *x, 0.0, 0.0)))
        .collect();
    kb.add_separators_and_barcodes(layer, &separators, &barcodes)?;
    Ok(reasoner.queries())
}

fn main() -> KbResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfkb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => KbConfig::load(path)?,
        None => KbConfig::default(),
    };

    let lines = match cli.command {
        Commands::Layout { file } => layout_report(&file)?,
        Commands::Query {
            kind:
                QueryKind::Layers {
                    shelf,
                    heights,
                    bottom_type,
                    layer_type,
                    hack,
                },
        } => preview_layers(config, &shelf, &heights, &bottom_type, &layer_type, hack)?,
        Commands::Query {
            kind:
                QueryKind::Separators {
                    layer,
                    width,
                    separators,
                    labels,
                },
        } => preview_separators(config, &layer, width, &separators, &labels)?,
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
