use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashboard_renderer::file_format::dashboard_config::DashboardConfig;
use dashboard_renderer::logging::init_logging;
use dashboard_renderer::utils::temp_dir::TempDir;
use dashboard_renderer::views::{PluginSet, PreRenderPlugin};
use dashboard_renderer::{Dashboard, DashboardError, Engine};
use serde_json::{json, Map, Value};

fn scratch(label: &str) -> TempDir {
    TempDir::create(label).unwrap()
}

/// Two nightly runs of a solver on one machine plus a single run on another,
/// grouped by solver and then by machine.
fn write_runs(root: &Path) -> Value {
    for (machine, runs) in &[("gaya", vec!["2024-01-01", "2024-01-02"]), ("discoverer", vec!["2024-01-01"])] {
        for run in runs {
            let dir = root.join("runs").join(machine).join(run);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("plots.json"), json!({ "run": run }).to_string()).unwrap();
        }
    }
    let runs = root.join("runs");
    json!({
        "views": { "solvers": "machines" },
        "component_map": {
            "component_order": ["machines", "solvers"],
            "mapping": {
                "gaya": { "solver": { "path": runs.join("gaya").to_str().unwrap() } },
                "discoverer": { "solver": { "path": runs.join("discoverer").to_str().unwrap() } }
            }
        },
        "components": {
            "machines": {
                "gaya": { "title": "Gaya" },
                "discoverer": { "title": "Discoverer" }
            },
            "solvers": {
                "solver": { "title": "Solver" }
            }
        },
        "dashboard_metadata": { "title": "Nightly benchmarks" },
        "template_defaults": {
            "leaves": { "data": [{ "filepath": "plots.json", "prefix": "plots" }] }
        }
    })
}

fn build(root: &Path, engine: Engine) -> Dashboard {
    let config = DashboardConfig::from_value(write_runs(root)).unwrap();
    match Dashboard::from_config(&config, engine, PluginSet::new()) {
        Ok(dashboard) => dashboard,
        Err(e) => panic!("{}", e),
    }
}

#[test]
fn test_tree_engine_print() {
    init_logging();
    let scratch = scratch("dashboard-it-print");
    let dashboard = build(scratch.path(), Engine::Tree);

    insta::assert_snapshot!(dashboard.print(), @r###"
dashboard_index
  solvers
    solver
      gaya
        gaya-solver-2024-01-01 *
        gaya-solver-2024-01-02 *
      discoverer
        discoverer-solver-2024-01-01 *
"###);
}

#[test]
fn test_graph_engine_print() {
    let scratch = scratch("dashboard-it-print-graph");
    let dashboard = build(scratch.path(), Engine::Graph);

    assert_eq!(dashboard.engine(), Engine::Graph);
    insta::assert_snapshot!(dashboard.print(), @r###"
machines
	gaya
	discoverer
solvers
	solver
		gaya -> 2
		discoverer -> 1
"###);
}

#[test]
fn test_render_both_engines() {
    let scratch = scratch("dashboard-it-render");
    for engine in &[Engine::Tree, Engine::Graph] {
        let mut dashboard = build(scratch.path(), *engine);
        let out = scratch.path().join(engine.to_string());
        dashboard.aggregate();
        dashboard.render(&out, false).unwrap();

        let leaves_dir = match engine {
            Engine::Tree => out.join("leaves"),
            Engine::Graph => out.join("pages/leaves"),
        };
        let leaf = fs::read_to_string(leaves_dir.join("gaya-solver-2024-01-02/leaf.adoc")).unwrap();
        assert!(leaf.starts_with("= 2024-01-02"), "{}", leaf);
        assert!(leaf.contains(":page-self-relpath: leaves/gaya-solver-2024-01-02"));
    }
    assert!(scratch.path().join("tree/index.adoc").is_file());
    assert!(scratch.path().join("graph/pages/index.adoc").is_file());
}

#[test]
fn test_render_clean_removes_stale_pages() {
    let scratch = scratch("dashboard-it-clean");
    let out = scratch.path().join("site");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("stale.adoc"), "old").unwrap();

    let mut dashboard = build(scratch.path(), Engine::Tree);
    dashboard.render(&out, false).unwrap();
    assert!(out.join("stale.adoc").exists());

    dashboard.render(&out, true).unwrap();
    assert!(!out.join("stale.adoc").exists());
    assert!(out.join("index.adoc").is_file());
}

#[test]
fn test_patch_from_files() {
    let scratch = scratch("dashboard-it-patch");
    let mut dashboard = build(scratch.path(), Engine::Tree);

    let patch = scratch.path().join("patch.json");
    fs::write(&patch, r#"{"figures": ["speedup"]}"#).unwrap();
    let targets = vec![vec!["all".to_string(), "solver".to_string(), "latest".to_string()]];
    dashboard
        .patch_template_info(&[patch.clone()], &targets, "plots", true)
        .unwrap();

    let saved: Value = serde_json::from_str(
        &fs::read_to_string(scratch.path().join("runs/gaya/2024-01-02/plots.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved, json!({"figures": ["speedup"]}));
    let untouched = fs::read_to_string(scratch.path().join("runs/gaya/2024-01-01/plots.json")).unwrap();
    assert!(!untouched.contains("speedup"));

    let missing = scratch.path().join("missing.json");
    match dashboard.patch_template_info(&[missing], &targets, "plots", false) {
        Err(DashboardError::Data(details)) => assert!(details.message.starts_with("Problem reading patch")),
        other => panic!("unexpected {:?}", other.err()),
    }
}

struct RunLabel;

impl PreRenderPlugin for RunLabel {
    fn name(&self) -> &str {
        "run_label"
    }

    fn process(&self, template_data: &Map<String, Value>) -> Value {
        match template_data.get("title") {
            Some(Value::String(title)) => json!(format!("run {}", title)),
            _ => Value::Null,
        }
    }
}

#[test]
fn test_plugins_reach_templates() {
    let scratch = scratch("dashboard-it-plugins");
    let template = scratch.path().join("run.adoc.liquid");
    fs::write(&template, "Label: {{ run_label }}").unwrap();
    let mut raw = write_runs(scratch.path());
    raw["template_defaults"]["leaves"]["template"] = json!(template.to_str().unwrap());
    let config = DashboardConfig::from_value(raw).unwrap();
    let plugins = PluginSet::new().with(Arc::new(RunLabel));
    let mut dashboard = match Dashboard::from_config(&config, Engine::Tree, plugins) {
        Ok(dashboard) => dashboard,
        Err(e) => panic!("{}", e),
    };

    let out = scratch.path().join("site");
    dashboard.render(&out, true).unwrap();
    let leaf = fs::read_to_string(out.join("leaves/discoverer-solver-2024-01-01/leaf.adoc")).unwrap();
    assert!(leaf.contains("Label: run 2024-01-01"), "{}", leaf);
    assert!(leaf.contains(":page-extra-templates: run.adoc.liquid"));
}

#[test]
fn test_config_from_toml_file() {
    let scratch = scratch("dashboard-it-toml");
    let path = scratch.path().join("dashboard.toml");
    fs::write(
        &path,
        r#"
[dashboard_metadata.data]
title = "From TOML"

[component_map.mapping.gaya.solver]
path = "nowhere"

[components.machines.gaya]
title = "Gaya"

[components.solvers.solver]
title = "Solver"
"#,
    )
    .unwrap();

    let dashboard = match Dashboard::from_config_path(&path, Engine::Graph, PluginSet::new()) {
        Ok(dashboard) => dashboard,
        Err(e) => panic!("{}", e),
    };
    assert!(dashboard.print().starts_with("machines\n"));
}

#[test]
fn test_alternate_views_of_components() {
    use dashboard_renderer::engine::ComponentGraphBuilder;
    use dashboard_renderer::views::ViewFactory;

    let config = DashboardConfig::from_value(json!({
        "views": {
            "a": { "d": { "b": "c", "c": "b" } },
            "d": { "a": { "b": "c" } },
            "b": { "c": { "a": "d" } }
        },
        "component_map": {
            "component_order": ["a", "b", "c", "d"],
            "mapping": {
                "a1": {
                    "b1": { "c1": { "d1": { "path": null } }, "c2": { "d1": { "path": null } } },
                    "b2": { "c2": { "d1": { "path": null } } }
                },
                "a3": {
                    "b4": { "c1": { "d1": { "path": null } } },
                    "b1": { "c2": { "d1": { "path": null } } }
                }
            }
        },
        "components": {
            "a": { "a1": {}, "a2": {}, "a3": {} },
            "b": { "b1": {}, "b2": {}, "b3": {}, "b4": {} },
            "c": { "c1": {}, "c2": {} },
            "d": { "d1": {} }
        }
    }))
    .unwrap();
    let builder = ComponentGraphBuilder::new(&config, &ViewFactory::default()).unwrap();

    assert_eq!(
        builder.component_views("a1").unwrap(),
        json!({ "d": { "d1": {
            "b": {
                "b1": { "c": { "c1": [], "c2": [] } },
                "b2": { "c": { "c2": [] } }
            },
            "c": {
                "c1": { "b": { "b1": [] } },
                "c2": { "b": { "b1": [], "b2": [] } }
            }
        }}})
    );
    assert_eq!(builder.component_views("c1").unwrap(), json!({}));
    assert!(matches!(builder.component_views("e1"), Err(DashboardError::Lookup(_))));
}
