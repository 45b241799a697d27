//! Result documents on disk

use graph_sync::Category;
use serde_json::{json, Value};
use std::path::Path;

/// A minimal solver result resolving one package named after the document
pub fn solver_payload(id: &str) -> Value {
    json!({
        "metadata": {"datetime": "2020-01-01T00:00:00", "analyzer_version": "1.5.0"},
        "result": {
            "tree": [{
                "package_name": format!("pkg-{id}"),
                "package_version": "1.0.0",
                "index_url": "https://pypi.org/simple",
                "dependencies": [{"package_name": "six", "resolved_versions": ["1.12.0"]}]
            }],
            "unresolved": [],
            "errors": []
        }
    })
}

/// Write a document where `FsDocumentStore` expects it
pub fn write_document(root: &Path, category: Category, id: &str, payload: &Value) {
    let dir = root.join(category.store_prefix());
    std::fs::create_dir_all(&dir).expect("Failed to create category directory");
    let body = serde_json::to_vec_pretty(payload).expect("Failed to serialize payload");
    std::fs::write(dir.join(format!("{id}.json")), body).expect("Failed to write document");
}

pub fn write_solver_documents(root: &Path, ids: &[&str]) {
    for id in ids {
        write_document(root, Category::Solver, id, &solver_payload(id));
    }
}
