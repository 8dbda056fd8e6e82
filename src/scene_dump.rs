use crate::inspector::PointRow;
use crate::metrics::RouteMetrics;
use crate::scene::{Layer, Scene};
use crate::selection::{LinkedSelection, Selection};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Debug snapshot of one frame: the scene plus the state it was built from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDump<'a> {
    pub solution_id: &'a str,
    /// Total reported by the solver, next to the recomputed one in `metrics`.
    pub reported_total: Option<f64>,
    pub width: f64,
    pub height: f64,
    pub selection: Selection,
    pub linked: LinkedSelection,
    pub metrics: &'a RouteMetrics,
    pub layers: Vec<LayerDump>,
    pub scene: &'a Scene,
    pub table: Vec<PointRow>,
}

#[derive(Debug, Serialize)]
pub struct LayerDump {
    pub layer: Layer,
    pub items: usize,
}

impl<'a> SceneDump<'a> {
    pub fn new(
        solution_id: &'a str,
        reported_total: Option<f64>,
        scene: &'a Scene,
        metrics: &'a RouteMetrics,
        selection: Selection,
        linked: LinkedSelection,
        table: Vec<PointRow>,
    ) -> Self {
        let layers = Layer::ALL
            .iter()
            .map(|layer| LayerDump {
                layer: *layer,
                items: scene.layer(*layer).count(),
            })
            .filter(|dump| dump.items > 0)
            .collect();
        SceneDump {
            solution_id,
            reported_total,
            width: scene.width,
            height: scene.height,
            selection,
            linked,
            metrics,
            layers,
            scene,
            table,
        }
    }
}

pub fn write_scene_dump(path: &Path, dump: &SceneDump<'_>) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
