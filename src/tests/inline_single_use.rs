use tempfile::TempDir;

use super::resolve_yaml_with_config;
use crate::ResolverConfig;

#[test]
fn single_use_external_is_spliced_back_in_when_inline_is_enabled() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("schemas")).unwrap();
    std::fs::write(dir.path().join("schemas/Once.yaml"), "type: string\n").unwrap();

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
                $ref: './schemas/Once.yaml'
";

    let doc = resolve_yaml_with_config(root, dir.path(), ResolverConfig::default().with_inline(true)).unwrap();

    let schema = doc.pointer("/paths/~1a/get/responses/200/content/application~1json/schema").unwrap();
    assert_eq!(schema.get("type").unwrap().as_str(), Some("string"));
    assert!(schema.get_ref().is_none());
    assert!(doc.get("components").is_none());
}

#[test]
fn the_same_external_referenced_twice_is_not_inlined() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("schemas")).unwrap();
    std::fs::write(dir.path().join("schemas/Shared.yaml"), "type: string\n").unwrap();

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
                $ref: './schemas/Shared.yaml'
  /b:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: './schemas/Shared.yaml'
";

    let doc = resolve_yaml_with_config(root, dir.path(), ResolverConfig::default().with_inline(true)).unwrap();

    let a = doc.pointer("/paths/~1a/get/responses/200/content/application~1json/schema").unwrap();
    assert_eq!(a.get_ref(), Some("#/components/schemas/Shared"));
    assert!(doc.pointer("/components/schemas/Shared").is_ok());
}
