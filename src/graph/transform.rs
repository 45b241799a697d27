//! Per-category rules turning a result document into graph entities
//!
//! Every document becomes one run node keyed by its document id, plus the
//! entities the category's result references. Unknown fields are ignored;
//! only the category's top-level result key is required.

use super::mutation::GraphMutation;
use super::node::{Node, NodeId};
use crate::sync::{Category, Document};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("{category} document {id} is not a JSON object")]
    NotAnObject { category: Category, id: String },

    #[error("{category} document {id} lacks required field {field:?}")]
    MissingField {
        category: Category,
        id: String,
        field: &'static str,
    },
}

/// Node type of the run node a category's documents map to
pub fn run_node_type(category: Category) -> &'static str {
    match category {
        Category::Solver => "solver_run",
        Category::PackageExtract => "image_analysis",
        Category::Adviser => "adviser_run",
        Category::ProvenanceChecker => "provenance_check",
        Category::DependencyMonkey => "dependency_monkey_run",
        Category::Inspection => "inspection_run",
    }
}

/// Id of the run node created for a document
pub fn run_node_id(category: Category, document_id: &str) -> NodeId {
    NodeId::from_key(run_node_type(category), document_id)
}

/// Build the graph mutation for a document
pub fn to_mutation(document: &Document) -> Result<GraphMutation, TransformError> {
    let category = document.category;
    let id = document.id.as_str();
    let payload = document
        .payload
        .as_object()
        .ok_or_else(|| TransformError::NotAnObject {
            category,
            id: id.to_string(),
        })?;

    let required = required_field(category);
    let Some(body) = payload.get(required) else {
        return Err(TransformError::MissingField {
            category,
            id: id.to_string(),
            field: required,
        });
    };

    let metadata = payload.get("metadata").unwrap_or(&Value::Null);
    let run = Node::new(run_node_type(category), id)
        .with_property("document_id", id)
        .with_property("category", category.slug())
        .with_optional("datetime", str_at(metadata, &["datetime"]))
        .with_optional("analyzer_version", str_at(metadata, &["analyzer_version"]));

    let mut mutation = GraphMutation::new();
    match category {
        Category::Solver => solver(&mut mutation, run, body),
        Category::PackageExtract => package_extract(&mut mutation, run, metadata, body),
        Category::Adviser => adviser(&mut mutation, run, body),
        Category::ProvenanceChecker => provenance(&mut mutation, run, body),
        Category::DependencyMonkey => dependency_monkey(&mut mutation, run, body),
        Category::Inspection => inspection(&mut mutation, run, payload.get("status"), body),
    }
    Ok(mutation)
}

fn required_field(category: Category) -> &'static str {
    match category {
        Category::Inspection => "specification",
        _ => "result",
    }
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .and_then(Value::as_str)
}

fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn package_version(name: &str, version: &str, index_url: Option<&str>) -> Node {
    let key = format!("{}=={}@{}", name.to_lowercase(), version, index_url.unwrap_or(""));
    Node::new("python_package_version", key)
        .with_property("package_name", name.to_lowercase())
        .with_property("package_version", version)
        .with_optional("index_url", index_url)
}

fn solver(mutation: &mut GraphMutation, run: Node, result: &Value) {
    let tree = array_at(result, &["tree"]);
    let run = run
        .with_property("resolved", tree.len())
        .with_property("unresolved", array_at(result, &["unresolved"]).len())
        .with_property("errors", array_at(result, &["errors"]).len());
    let run_id = mutation.add_node(run);

    for entry in tree {
        let (Some(name), Some(version)) = (
            str_at(entry, &["package_name"]),
            str_at(entry, &["package_version"]),
        ) else {
            continue;
        };
        let index_url = str_at(entry, &["index_url"]);
        let package = mutation.add_node(package_version(name, version, index_url));
        mutation.connect(run_id, package, "solved");

        for dependency in array_at(entry, &["dependencies"]) {
            let Some(dep_name) = str_at(dependency, &["package_name"]) else {
                continue;
            };
            let dep_index = str_at(dependency, &["index_url"]).or(index_url);
            for resolved in array_at(dependency, &["resolved_versions"]) {
                let Some(dep_version) = resolved.as_str() else {
                    continue;
                };
                let dep = mutation.add_node(package_version(dep_name, dep_version, dep_index));
                mutation.connect(package, dep, "depends_on");
            }
        }
    }
}

fn package_extract(mutation: &mut GraphMutation, run: Node, metadata: &Value, result: &Value) {
    let image = str_at(metadata, &["arguments", "extract-image", "image"])
        .or_else(|| str_at(result, &["image"]));
    let run_id = mutation.add_node(run.with_optional("image", image));

    if let Some(image) = image {
        let image_id = mutation.add_node(Node::new("container_image", image).with_property("image", image));
        mutation.connect(run_id, image_id, "analyzed");
    }

    let Some(ecosystems) = result.as_object() else {
        return;
    };
    for (ecosystem, packages) in ecosystems {
        let Some(packages) = packages.as_array() else {
            continue;
        };
        for package in packages {
            let (Some(name), Some(version)) =
                (str_at(package, &["name"]), str_at(package, &["version"]))
            else {
                continue;
            };
            let node = Node::new("package", format!("{ecosystem}:{name}=={version}"))
                .with_property("ecosystem", ecosystem.as_str())
                .with_property("package_name", name)
                .with_property("package_version", version);
            let package_id = mutation.add_node(node);
            mutation.connect(run_id, package_id, "installed");
        }
    }
}

/// Locked requirements of the first recommended stack
fn first_locked_stack(result: &Value) -> Option<&serde_json::Map<String, Value>> {
    let first = array_at(result, &["report"]).first()?;
    // Report entries are either a project or a (justification, project) pair.
    let project = match first.as_array() {
        Some(pair) => pair.last()?,
        None => first,
    };
    let project = project.get("project").unwrap_or(project);
    project
        .get("requirements_locked")?
        .get("default")?
        .as_object()
}

fn adviser(mutation: &mut GraphMutation, run: Node, result: &Value) {
    let error = result.get("error").and_then(Value::as_bool).unwrap_or(false);
    let run_id = mutation.add_node(run.with_property("error", error));

    let Some(locked) = first_locked_stack(result) else {
        return;
    };
    for (name, entry) in locked {
        let Some(version) = str_at(entry, &["version"]) else {
            continue;
        };
        let version = version.trim_start_matches("==");
        let index_url = str_at(entry, &["index"]);
        let package = mutation.add_node(package_version(name, version, index_url));
        mutation.connect(run_id, package, "recommends");
    }
}

fn provenance(mutation: &mut GraphMutation, run: Node, result: &Value) {
    let findings = array_at(result, &["report"]);
    let run_id = mutation.add_node(run.with_property("findings", findings.len()));

    for finding in findings {
        let Some(name) = str_at(finding, &["package_name"]) else {
            continue;
        };
        let package = mutation.add_node(
            Node::new("python_package", name.to_lowercase())
                .with_property("package_name", name.to_lowercase()),
        );
        mutation.connect(run_id, package, "flagged");
    }
}

fn dependency_monkey(mutation: &mut GraphMutation, run: Node, result: &Value) {
    let output = array_at(result, &["output"]);
    let run_id = mutation.add_node(run.with_property("produced", output.len()));

    for item in output {
        let inspection = item
            .as_str()
            .or_else(|| str_at(item, &["inspection_id"]))
            .or_else(|| str_at(item, &["id"]));
        let Some(inspection) = inspection else {
            continue;
        };
        let target = mutation.add_node(
            Node::new(run_node_type(Category::Inspection), inspection)
                .with_property("document_id", inspection),
        );
        mutation.connect(run_id, target, "produced");
    }
}

fn inspection(mutation: &mut GraphMutation, run: Node, status: Option<&Value>, specification: &Value) {
    let state = status.and_then(|s| str_at(s, &["state"]));
    let run_id = mutation.add_node(run.with_optional("state", state));

    if let Some(base) = str_at(specification, &["base"]) {
        let image = mutation.add_node(Node::new("container_image", base).with_property("image", base));
        mutation.connect(run_id, image, "ran_on");
    }
}
