// tests/render.rs

//! Integration tests for rendering recipes into finalized metadata.

mod common;

use common::{
    renderer, test_config, write_recipe, MockSourceProvider, GIT_NO_TEMPLATE_RECIPE, GIT_RECIPE,
    HOST_ENTRIES_RECIPE, TEST_SUBDIR,
};
use conary_render::{api, Error, Phase, RenderOptions, SourceFacts, VariantConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn python_variant() -> VariantConfig {
    VariantConfig::new().with_variable("python", ["3.6"])
}

#[test]
fn test_no_download_with_finalize_requires_source() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "git_recipe", GIT_RECIPE);
    let provider = Arc::new(MockSourceProvider::git_describe());
    let r = renderer(test_config(temp.path(), python_variant()), provider.clone());

    let err = r
        .render(&recipe, &RenderOptions::new().no_download_source(true))
        .unwrap_err();

    match err {
        Error::SourceRequired { expressions, .. } => {
            assert!(expressions.iter().any(|e| e == "GIT_DESCRIBE_TAG"));
        }
        other => panic!("expected SourceRequired, got {:?}", other),
    }
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn test_no_download_without_finalize_flags_download() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "git_recipe", GIT_RECIPE);
    let provider = Arc::new(MockSourceProvider::git_describe());
    let r = renderer(test_config(temp.path(), python_variant()), provider.clone());

    let rendered = r
        .render(
            &recipe,
            &RenderOptions::new().no_download_source(true).finalize(false),
        )
        .unwrap();

    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].need_download);
    assert!(!rendered[0].metadata.is_final());
    assert_eq!(rendered[0].metadata.version(), "");
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn test_download_fills_source_fields() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "git_recipe", GIT_RECIPE);
    let provider = Arc::new(MockSourceProvider::git_describe());
    let r = renderer(test_config(temp.path(), python_variant()), provider.clone());

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();

    assert_eq!(rendered.len(), 1);
    let entry = &rendered[0];
    assert!(!entry.need_download);
    assert!(!entry.need_reparse_in_env);

    let metadata = &entry.metadata;
    assert!(metadata.is_final());
    assert_eq!(metadata.version(), "1.20.2");
    assert_eq!(metadata.build_number(), 0);

    let hash = metadata.hash_dependencies().unwrap();
    assert_eq!(
        metadata.build_id().unwrap(),
        format!("py36{}_0_g262d444", hash)
    );

    let path = api::get_output_file_paths(metadata, r.config(), false).unwrap();
    assert_eq!(path.len(), 1);
    assert!(path[0].starts_with(temp.path().join(TEST_SUBDIR)));
    assert_eq!(
        path[0].file_name().unwrap().to_string_lossy(),
        format!("git_recipe-1.20.2-py36{}_0_g262d444.tar.bz2", hash)
    );
}

#[test]
fn test_source_fetched_once_across_variants() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "git_recipe", GIT_RECIPE);
    let provider = Arc::new(MockSourceProvider::git_describe());
    let variant = VariantConfig::new().with_variable("python", ["2.7", "3.6"]);
    let r = renderer(test_config(temp.path(), variant), provider.clone());

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();

    assert_eq!(rendered.len(), 2);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(
        provider.calls()[0].git_url.as_deref(),
        Some("https://example.com/git_recipe.git")
    );
    for entry in &rendered {
        assert_eq!(entry.metadata.version(), "1.20.2");
    }
}

#[test]
fn test_fetch_failure_propagates() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "git_recipe", GIT_RECIPE);
    let provider = Arc::new(MockSourceProvider::failing());
    let r = renderer(test_config(temp.path(), python_variant()), provider.clone());

    let err = r.render(&recipe, &RenderOptions::new()).unwrap_err();
    assert!(matches!(err, Error::FetchError { .. }));
}

#[test]
fn test_git_source_without_source_fields_is_not_fetched() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "plain_git", GIT_NO_TEMPLATE_RECIPE);
    let provider = Arc::new(MockSourceProvider::git_describe());
    let r = renderer(test_config(temp.path(), VariantConfig::new()), provider.clone());

    let rendered = r
        .render(&recipe, &RenderOptions::new().no_download_source(true))
        .unwrap();

    assert_eq!(rendered.len(), 1);
    assert!(!rendered[0].need_download);
    assert!(rendered[0].metadata.is_final());
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn test_variant_matrix_expands_referenced_variables() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "host_entries", HOST_ENTRIES_RECIPE);
    let variant = VariantConfig::new()
        .with_variable("python", ["2.7", "3.6"])
        .with_variable("numpy", ["1.11", "1.16"])
        .with_variable("perl", ["5.26", "5.30"]);
    let r = renderer(
        test_config(temp.path(), variant),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    assert_eq!(rendered.len(), 4);

    let ids: Vec<String> = rendered
        .iter()
        .map(|e| e.metadata.build_id().unwrap())
        .collect();
    assert_eq!(ids.iter().filter(|id| id.starts_with("py27h")).count(), 2);
    assert_eq!(ids.iter().filter(|id| id.starts_with("py36h")).count(), 2);

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 4);

    for entry in &rendered {
        assert!(entry.metadata.variant().get("perl").is_none());
        assert!(!entry.metadata.used_variables().contains("perl"));
    }
}

#[test]
fn test_variant_values_pin_host_and_run() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "host_entries", HOST_ENTRIES_RECIPE);
    let variant = VariantConfig::new()
        .with_variable("python", ["2.7"])
        .with_variable("numpy", ["1.11"]);
    let r = renderer(
        test_config(temp.path(), variant),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    let metadata = &rendered[0].metadata;

    assert_eq!(
        metadata.requirements(Phase::Host),
        &[
            "numpy 1.11.3 py_0".to_string(),
            "python 2.7.15 h1a2b3c4_0".to_string()
        ]
    );
    assert_eq!(
        metadata.requirements(Phase::Run),
        &["python >=2.7,<2.8.0a0".to_string(), "numpy".to_string()]
    );
}

#[test]
fn test_recipe_without_variables_renders_once() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "plain",
        "package:\n  name: plain\n  version: \"0.1\"\nrequirements:\n  run:\n    - zlib\n",
    );
    let variant = VariantConfig::new().with_variable("python", ["2.7", "3.6"]);
    let r = renderer(
        test_config(temp.path(), variant),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].metadata.variant().is_empty());
    assert!(rendered[0].metadata.build_id().unwrap().starts_with('h'));
}

#[test]
fn test_duplicate_variants_are_collapsed() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "host_entries", HOST_ENTRIES_RECIPE);
    let variant = VariantConfig::new()
        .with_variable("python", ["3.6", "3.6"])
        .with_variable("numpy", ["1.16"]);
    let r = renderer(
        test_config(temp.path(), variant),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    assert_eq!(rendered.len(), 1);
}

#[test]
fn test_explicit_build_string_wins() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "steve",
        r#"
package:
  name: build_string
  version: "1.0"
build:
  string: steve
requirements:
  host:
    - zlib
"#,
    );
    let r = renderer(
        test_config(temp.path(), VariantConfig::new()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    let metadata = &rendered[0].metadata;

    assert_eq!(metadata.build_id().unwrap(), "steve");
    assert!(metadata.hash_dependencies().unwrap().starts_with('h'));

    let paths = api::get_output_file_paths(&recipe, r.config(), false).unwrap();
    assert!(paths[0].to_string_lossy().ends_with("build_string-1.0-steve.tar.bz2"));
}

#[test]
fn test_explicit_build_string_ignores_dependency_changes() {
    let temp = TempDir::new().unwrap();
    let r = renderer(
        test_config(temp.path(), VariantConfig::new()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let mut hashes = Vec::new();
    for (dir, build) in [("steve_zlib", "zlib 1.2.8"), ("steve_make", "make")] {
        let recipe = write_recipe(
            &temp,
            dir,
            &format!(
                "package:\n  name: build_string\n  version: \"1.0\"\nbuild:\n  string: steve\nrequirements:\n  build:\n    - {}\n",
                build
            ),
        );
        let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
        let metadata = &rendered[0].metadata;

        assert_eq!(metadata.build_id().unwrap(), "steve");
        hashes.push(metadata.hash_dependencies().unwrap());
    }

    assert_ne!(hashes[0], hashes[1]);
}

#[test]
fn test_missing_source_facts_fail_render() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "nofact",
        r#"
package:
  name: nofact
  version: "1.0"
source:
  url: https://example.com/nofact-1.0.tar.gz
  sha256: 2a2b2c2d2e2f303132333435363738393a3b3c3d3e3f40414243444546474849
build:
  string: "{{ GIT_BUILD_STR }}"
"#,
    );
    let provider = Arc::new(MockSourceProvider::with_facts(SourceFacts::new()));
    let r = renderer(test_config(temp.path(), VariantConfig::new()), provider.clone());

    let err = r.render(&recipe, &RenderOptions::new()).unwrap_err();
    match err {
        Error::MissingSourceFacts { facts, .. } => {
            assert_eq!(facts, vec!["GIT_BUILD_STR".to_string()]);
        }
        other => panic!("expected MissingSourceFacts, got {:?}", other),
    }
    assert_eq!(provider.call_count(), 1);
    assert!(api::get_output_file_paths(&recipe, r.config(), false).is_err());
}

#[test]
fn test_rendering_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "host_entries", HOST_ENTRIES_RECIPE);
    let variant = VariantConfig::new()
        .with_variable("python", ["2.7", "3.6"])
        .with_variable("numpy", ["1.16"]);
    let config = test_config(temp.path(), variant);
    let r = renderer(config.clone(), Arc::new(MockSourceProvider::git_describe()));

    let first = r.render(&recipe, &RenderOptions::new()).unwrap();
    let second = r.render(&recipe, &RenderOptions::new()).unwrap();

    let names = |result: &Vec<conary_render::RenderedMetadata>| -> Vec<String> {
        result
            .iter()
            .map(|e| e.metadata.dist_name().unwrap())
            .collect()
    };
    assert_eq!(names(&first), names(&second));

    let from_recipe = api::get_output_file_paths(&recipe, &config, false).unwrap();
    let from_metadata: Vec<_> = first
        .iter()
        .flat_map(|e| api::get_output_file_paths(&e.metadata, &config, false).unwrap())
        .collect();
    assert_eq!(from_recipe, from_metadata);
}

#[test]
fn test_non_final_metadata_has_no_identity() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "host_entries", HOST_ENTRIES_RECIPE);
    let r = renderer(
        test_config(temp.path(), python_variant()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r
        .render(&recipe, &RenderOptions::new().finalize(false))
        .unwrap();
    let metadata = &rendered[0].metadata;

    assert!(!metadata.is_final());
    assert!(matches!(
        metadata.hash_dependencies(),
        Err(Error::HashInputIncomplete { .. })
    ));
    assert!(metadata.build_id().is_err());
    assert!(api::get_output_file_paths(metadata, r.config(), false).is_err());
}

#[test]
fn test_pin_compatible_uses_host_version() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "pinned",
        r#"
package:
  name: pinned
  version: "1.0"
requirements:
  host:
    - zlib
  run:
    - {{ pin_compatible('zlib') }}
"#,
    );
    let r = renderer(
        test_config(temp.path(), VariantConfig::new()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    assert_eq!(
        rendered[0].metadata.requirements(Phase::Run),
        &["zlib >=1.2.8,<2.0a0".to_string()]
    );
}

#[test]
fn test_pin_depends_strict_pins_run_exactly() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "strict",
        r#"
package:
  name: strict
  version: "1.0"
build:
  pin_depends: strict
requirements:
  host:
    - python
  run:
    - python
"#,
    );
    let r = renderer(
        test_config(temp.path(), python_variant()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    let run = rendered[0].metadata.requirements(Phase::Run);
    assert_eq!(run, &["python 3.6.5 h5d6e7f8_0".to_string()]);
}

#[test]
fn test_unknown_variable_is_ambiguous() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "mystery",
        "package:\n  name: mystery\n  version: \"{{ mystery_version }}\"\n",
    );
    let r = renderer(
        test_config(temp.path(), VariantConfig::new()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let err = r.render(&recipe, &RenderOptions::new()).unwrap_err();
    match err {
        Error::AmbiguousVariant { variable, .. } => assert_eq!(variable, "mystery_version"),
        other => panic!("expected AmbiguousVariant, got {:?}", other),
    }
}

#[test]
fn test_env_only_function_requests_reparse() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "setup_py",
        r#"{% set data = load_setup_py_data() %}
package:
  name: setup_py
  version: "{{ data.version | default(value='0.1') }}"
"#,
    );
    let r = renderer(
        test_config(temp.path(), VariantConfig::new()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    assert!(rendered[0].need_reparse_in_env);
    assert_eq!(rendered[0].metadata.version(), "0.1");
}

#[test]
fn test_skipped_variants_are_dropped() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "skippy",
        r#"
package:
  name: skippy
  version: "1.0"
build:
  skip: {{ python == "2.7" }}
requirements:
  host:
    - python
"#,
    );
    let variant = VariantConfig::new().with_variable("python", ["2.7", "3.6"]);
    let r = renderer(
        test_config(temp.path(), variant),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].metadata.variant().get("python"), Some("3.6"));
}

#[test]
fn test_unsatisfiable_requirements() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(
        &temp,
        "missing",
        r#"
package:
  name: missing
  version: "1.0"
requirements:
  host:
    - not_in_index >=2
"#,
    );
    let r = renderer(
        test_config(temp.path(), VariantConfig::new()),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let err = r.render(&recipe, &RenderOptions::new()).unwrap_err();
    match err {
        Error::Unsatisfiable { phase, specs, .. } => {
            assert_eq!(phase, "host");
            assert_eq!(specs, vec!["not_in_index >=2".to_string()]);
        }
        other => panic!("expected Unsatisfiable, got {:?}", other),
    }

    let rendered = r
        .render(&recipe, &RenderOptions::new().bypass_env_check(true))
        .unwrap();
    assert_eq!(
        rendered[0].metadata.requirements(Phase::Host),
        &["not_in_index >=2".to_string()]
    );
}

#[test]
fn test_output_yaml_round_trip() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "host_entries", HOST_ENTRIES_RECIPE);
    let variant = VariantConfig::new()
        .with_variable("python", ["3.6"])
        .with_variable("numpy", ["1.16"]);
    let r = renderer(
        test_config(temp.path(), variant),
        Arc::new(MockSourceProvider::git_describe()),
    );

    let rendered = r.render(&recipe, &RenderOptions::new()).unwrap();
    let original = &rendered[0].metadata;

    let out = temp.path().join("rendered").join("meta.yaml");
    let text = api::output_yaml(original, Some(&out)).unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), text);

    let again = r.render(&out, &RenderOptions::new()).unwrap();
    assert_eq!(again.len(), 1);
    let reparsed = &again[0].metadata;

    assert_eq!(reparsed.identity().unwrap(), original.identity().unwrap());
    assert_eq!(
        reparsed.requirements(Phase::Host),
        original.requirements(Phase::Host)
    );
    assert_eq!(
        reparsed.requirements(Phase::Run),
        original.requirements(Phase::Run)
    );
}

#[test]
fn test_api_render_uses_config() {
    let temp = TempDir::new().unwrap();
    let recipe = write_recipe(&temp, "plain_git", GIT_NO_TEMPLATE_RECIPE);
    let config = test_config(temp.path(), VariantConfig::new());

    let rendered = api::render(&recipe, &config, &RenderOptions::new()).unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].metadata.config().host_subdir, TEST_SUBDIR);
    assert_eq!(
        rendered[0].metadata.requirements(Phase::Host),
        &["zlib 1.2.8 h0000001_0".to_string()]
    );
}
