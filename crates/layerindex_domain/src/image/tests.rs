use super::*;

fn layer(digest: &str, size: i64) -> LayerMetadata {
    LayerMetadata {
        size_bytes: size,
        digest: Digest::new(digest).unwrap(),
    }
}

#[test]
fn test_parse_namespaced_reference() {
    let r = ImageReference::parse("myrepo/nginx:1.21").unwrap();
    assert_eq!(r.repository_segment, "myrepo");
    assert_eq!(r.image_name, "nginx");
    assert_eq!(r.tag, "1.21");
}

#[test]
fn test_parse_bare_name_defaults_tag() {
    let r = ImageReference::parse("nginx").unwrap();
    assert_eq!(r.repository_segment, "");
    assert_eq!(r.image_name, "nginx");
    assert_eq!(r.tag, "latest");
}

#[test]
fn test_parse_strips_registry_host() {
    let r = ImageReference::parse("localhost:5000/myrepo/nginx:1.21").unwrap();
    assert_eq!(r.repository_segment, "myrepo");
    assert_eq!(r.image_name, "nginx");
    assert_eq!(r.tag, "1.21");

    let r = ImageReference::parse("registry.example.com/nginx").unwrap();
    assert_eq!(r.repository_segment, "");
    assert_eq!(r.tag, "latest");
}

#[test]
fn test_parse_strips_scheme_and_host() {
    let r = ImageReference::parse("http://127.0.0.1:5000/library/redis:7").unwrap();
    assert_eq!(r.repository_segment, "library");
    assert_eq!(r.image_name, "redis");
    assert_eq!(r.tag, "7");

    let r = ImageReference::parse("https://registry/redis").unwrap();
    assert_eq!(r.repository_segment, "");
    assert_eq!(r.image_name, "redis");
}

#[test]
fn test_parse_keeps_only_nearest_segment() {
    let r = ImageReference::parse("host.io/a/b/app:v2").unwrap();
    assert_eq!(r.repository_segment, "b");
    assert_eq!(r.name(), "b/app:v2");
}

#[test]
fn test_parse_rejects_empty() {
    assert!(ImageReference::parse("").is_err());
    assert!(ImageReference::parse("   ").is_err());
    assert!(ImageReference::parse("http://host").is_err());
    assert!(ImageReference::parse("localhost:5000/").is_err());
    assert!(ImageReference::parse("nginx:").is_err());
}

#[test]
fn test_tag_is_latest_only_without_colon_after_last_slash() {
    for raw in ["nginx", "a/nginx", "localhost:5000/a/nginx", "http://h:1/a/nginx"] {
        assert_eq!(ImageReference::parse(raw).unwrap().tag, "latest", "{}", raw);
    }
    for raw in ["nginx:1", "a/nginx:stable", "localhost:5000/a/nginx:x"] {
        assert_ne!(ImageReference::parse(raw).unwrap().tag, "latest", "{}", raw);
    }
}

#[test]
fn test_projections() {
    let r = ImageReference::parse("localhost:5000/myrepo/nginx:1.21").unwrap();
    assert_eq!(r.name(), "myrepo/nginx:1.21");
    assert_eq!(r.name_without_repository(), "nginx:1.21");
    assert_eq!(r.repository_path(), "myrepo/nginx");
}

#[test]
fn test_key_is_shared_by_catalog_and_consumer_forms() {
    let from_catalog = ImageReference::from_repository("myrepo/nginx", "1.21").unwrap().key();
    let from_consumer = ImageKey::parse("http://localhost:5000/myrepo/nginx:1.21").unwrap();
    assert_eq!(from_catalog, from_consumer);
    assert_eq!(from_catalog.as_str(), "myrepo/nginx:1.21");

    // Catalog paths are never treated as carrying a host.
    let dotted = ImageReference::from_repository("my.org/app", "1").unwrap();
    assert_eq!(dotted.repository_segment, "my.org");
    assert_eq!(dotted.key().as_str(), "my.org/app:1");
}

#[test]
fn test_key_candidates_include_literal_reading() {
    let keys = ImageKey::candidates("my.team/app:1.0").unwrap();
    let keys: Vec<_> = keys.iter().map(ImageKey::as_str).collect();
    assert_eq!(keys, ["app:1.0", "my.team/app:1.0"]);

    let keys = ImageKey::candidates("myrepo/nginx:1.21").unwrap();
    assert_eq!(keys.len(), 1);
    assert!(ImageKey::candidates("").is_err());
}

#[test]
fn test_digest_parts() {
    assert_eq!(Digest::new("sha256:abc").unwrap().encoded(), "abc");
    assert_eq!(Digest::new("abc").unwrap().encoded(), "abc");
}

#[test]
fn test_empty_digest_has_its_own_code() {
    let err = Digest::new(" ").unwrap_err();
    assert_eq!(err.code(), DigestError::INVALID);
    assert_eq!(err.downcast_ref::<DigestError>(), Some(&DigestError::Empty));
    assert!(err.downcast_ref::<ReferenceError>().is_none());
}

#[test]
fn test_metadata_total_is_layer_sum() {
    let r = ImageReference::parse("myrepo/nginx:1.21").unwrap();
    let m = ImageMetadata::new(
        &r,
        &Digest::new("sha256:cfg").unwrap(),
        vec![layer("sha256:d1", 100), layer("sha256:d2", 200)],
    );
    assert_eq!(m.total_size_bytes, 300);
    assert_eq!(m.id, "cfg");
    assert_eq!(m.name, "myrepo/nginx:1.21");
    assert_eq!(m.name_without_repo, "nginx:1.21");
    assert_eq!(m.tag, "1.21");
}

#[test]
fn test_index_layers_are_not_deduplicated() {
    let a = ImageReference::parse("a:1").unwrap();
    let b = ImageReference::parse("b:1").unwrap();
    let cfg = Digest::new("sha256:cfg").unwrap();
    let index: MetadataIndex = [
        (a.key(), ImageMetadata::new(&a, &cfg, vec![layer("d1", 100), layer("d2", 200)])),
        (b.key(), ImageMetadata::new(&b, &cfg, vec![layer("d2", 200), layer("d3", 50)])),
    ]
    .into_iter()
    .collect();

    assert_eq!(index.layers().count(), 4);
    assert_eq!(index.layers().filter(|l| l.digest.as_str() == "d2").count(), 2);
    assert_eq!(index.find_layer("d3").map(|l| l.size_bytes), Some(50));
    assert!(index.find_layer("d4").is_none());
}

#[test]
fn test_snapshot_field_names() {
    let r = ImageReference::parse("nginx:1").unwrap();
    let index: MetadataIndex = [(
        r.key(),
        ImageMetadata::new(&r, &Digest::new("sha256:cfg").unwrap(), vec![layer("sha256:d1", 7)]),
    )]
    .into_iter()
    .collect();

    let json = serde_json::to_value(&index).unwrap();
    let entry = &json["images"]["nginx:1"];
    assert_eq!(entry["id"], "cfg");
    assert_eq!(entry["name"], "nginx:1");
    assert_eq!(entry["name_without_repo"], "nginx:1");
    assert_eq!(entry["tag"], "1");
    assert_eq!(entry["total_size"], 7);
    assert_eq!(entry["layer_metadata"][0]["size"], 7);
    assert_eq!(entry["layer_metadata"][0]["layer"], "sha256:d1");
}

#[test]
fn test_snapshot_keys_decode_literally() {
    let r = ImageReference::from_repository("my.team/app", "1.0").unwrap();
    let index: MetadataIndex = [(
        r.key(),
        ImageMetadata::new(&r, &Digest::new("sha256:cfg").unwrap(), vec![layer("sha256:d1", 7)]),
    )]
    .into_iter()
    .collect();

    let json = serde_json::to_string(&index).unwrap();
    let decoded: MetadataIndex = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, index);
    assert!(decoded.get(&r.key()).is_some());

    let raw = r#"{"images": {"x/app": {
        "id": "c", "name": "x/app:latest", "name_without_repo": "app:latest",
        "tag": "latest", "total_size": 0, "layer_metadata": []}}}"#;
    let index: MetadataIndex = serde_json::from_str(raw).unwrap();
    assert!(index.get(&ImageKey::parse("x/app:latest").unwrap()).is_some());
}
