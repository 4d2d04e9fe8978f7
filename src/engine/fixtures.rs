//! Configurations shared by the engine and repository tests.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::file_format::dashboard_config::{ConfigNode, DashboardConfig};
use crate::utils::temp_dir::TempDir;

/// Four repositories with overlapping views and no leaves on disk.
pub fn views_config() -> DashboardConfig {
    DashboardConfig::from_value(json!({
        "views": {
            "a": { "d": { "b": "c", "c": "b" } },
            "d": { "a": { "b": "c" } },
            "b": { "c": { "a": "d" } }
        },
        "component_map": {
            "component_order": ["a", "b", "c", "d"],
            "mapping": {
                "a1": {
                    "b1": {
                        "c1": { "d1": { "path": null } },
                        "c2": { "d1": { "path": null } }
                    },
                    "b2": {
                        "c2": { "d1": { "path": null } }
                    }
                },
                "a3": {
                    "b4": {
                        "c1": { "d1": { "path": null } }
                    },
                    "b1": {
                        "c2": { "d1": { "path": null } }
                    }
                }
            }
        },
        "components": {
            "a": {
                "a1": { "display_name": "A1 NodeComponent" },
                "a2": { "display_name": "A2 NodeComponent" },
                "a3": { "display_name": "A3 NodeComponent" }
            },
            "b": {
                "b1": { "display_name": "B1 NodeComponent" },
                "b2": { "display_name": "B2 NodeComponent" },
                "b3": { "display_name": "B3 NodeComponent" },
                "b4": { "display_name": "B4 NodeComponent" }
            },
            "c": {
                "c1": { "display_name": "C1 NodeComponent" },
                "c2": { "display_name": "C2 NodeComponent" }
            },
            "d": {
                "d1": { "display_name": "D1 NodeComponent" }
            }
        },
        "repositories": {
            "a": { "display_name": "A" },
            "b": { "display_name": "B" },
            "c": { "display_name": "C" },
            "d": { "display_name": "D" }
        }
    }))
    .unwrap()
}

/// Two machines running one application, with benchmark runs on disk:
/// `gaya` has `r1` and `r2`, `discoverer` has `r1`.  Every run holds a
/// `plots.json` loaded under the `plots` prefix.  Applications head a view
/// grouping by machine.
pub fn runs_config(label: &str) -> (TempDir, DashboardConfig) {
    let dir = TempDir::new(label);
    for (machine, runs) in &[("gaya", vec!["r1", "r2"]), ("discoverer", vec!["r1"])] {
        for run in runs {
            let run_dir = dir.join(machine).join(run);
            fs::create_dir_all(&run_dir).unwrap();
            fs::write(run_dir.join("plots.json"), r#"{"figures": []}"#).unwrap();
        }
    }

    let config = DashboardConfig::from_value(json!({
        "views": { "applications": "machines" },
        "component_map": {
            "component_order": ["machines", "applications"],
            "mapping": {
                "gaya": { "toolbox": { "path": dir.join("gaya").to_str().unwrap() } },
                "discoverer": { "toolbox": { "path": dir.join("discoverer").to_str().unwrap() } }
            }
        },
        "components": {
            "machines": {
                "gaya": { "title": "Gaya" },
                "discoverer": { "title": "Discoverer" }
            },
            "applications": {
                "toolbox": { "title": "Toolbox" }
            }
        },
        "repositories": {
            "machines": { "title": "Machines" },
            "applications": { "title": "Applications" }
        },
        "dashboard_metadata": { "title": "Benchmarks" },
        "template_defaults": {
            "leaves": { "data": [{ "filepath": "plots.json", "prefix": "plots" }] }
        }
    }))
    .unwrap();
    (dir, config)
}

/// Add runs for `karolina`, a machine present in the mapping but not
/// declared among the `machines` components.
pub fn add_undeclared_machine(dir: &Path, config: &mut DashboardConfig) {
    let run_dir = dir.join("karolina").join("r1");
    fs::create_dir_all(&run_dir).unwrap();
    fs::write(run_dir.join("plots.json"), r#"{"figures": []}"#).unwrap();

    let node = ConfigNode::from_value(json!({
        "toolbox": { "path": dir.join("karolina").to_str().unwrap() }
    }))
    .unwrap();
    match &mut config.component_map.mapping {
        ConfigNode::Group(children) => children.push(("karolina".to_string(), node)),
        ConfigNode::LeafRecord(_) => panic!("mapping root is a leaf record"),
    }
}
