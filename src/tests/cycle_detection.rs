use tempfile::TempDir;

use super::{resolve_yaml, root_cause};
use crate::ResolveError;

#[test]
fn mutually_referencing_files_report_a_circular_reference() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("A.yaml"), "type: object\nproperties:\n  b:\n    $ref: './B.yaml'\n").unwrap();
    std::fs::write(dir.path().join("B.yaml"), "type: object\nproperties:\n  a:\n    $ref: './A.yaml'\n").unwrap();

    let root = "\
openapi: 3.0.0
info:
  title: x
  version: '1'
paths:
  /a:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: './A.yaml'
";

    let err = resolve_yaml(root, dir.path()).unwrap_err();
    match root_cause(&err) {
        ResolveError::CircularReference(path) => {
            let joined = path.to_string();
            assert!(joined.contains("A.yaml"));
            assert!(joined.contains("B.yaml"));
        }
        other => panic!("expected CircularReference, got {other:?}"),
    }
}
