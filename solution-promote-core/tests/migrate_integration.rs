use std::sync::{Arc, Mutex};

use serde_json::json;
use solution_promote_core::config::Timings;
use solution_promote_core::contract::{JobStatus, MockInstance};
use solution_promote_core::error::PromoteError;
use solution_promote_core::manifest::DependencyManifest;
use solution_promote_core::migrate::{
    deploy_latest, migrate_dependencies, migrate_solution, publish_all, read_embedded_manifest, MigrationPlan,
};
use solution_promote_core::version::ArtifactVersion;

const ARTIFACT: &str = "src/builds/app-1.0.0.ibsolution";

fn plan() -> MigrationPlan {
    MigrationPlan {
        source_folder: "src/builds".into(),
        name_filter: None,
        target_folder: "tgt/solutions".into(),
        source_staging_folder: "src/staging".into(),
        target_dependencies_parent: "tgt/deps".into(),
    }
}

fn package_json(models: &[&str], dev: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "name": "app",
        "version": "1.0.0",
        "dependencies": {"models": models, "dev_exchange_packages": dev}
    }))
    .unwrap()
}

/// Source side of a migration: one artifact whose embedded manifest is `manifest`.
fn source_with_manifest(manifest: Vec<u8>) -> MockInstance {
    let mut source = MockInstance::new();
    source
        .expect_list()
        .returning(|_| Ok(vec![ARTIFACT.to_string()]));
    source
        .expect_copy()
        .withf(|src, dst| src == ARTIFACT && dst.starts_with("src/staging/manifest_") && dst.ends_with(".zip"))
        .times(1)
        .returning(|_, _| Ok(()));
    source.expect_exists().returning(|_| Ok(true));
    source.expect_extract().times(1).returning(|_, _| Ok(()));
    source.expect_delete().times(2).returning(|_| ());
    source.expect_create_folder().returning(|_| Ok(()));
    source.expect_read().returning(move |path| {
        if path.ends_with("/package.json") {
            Ok(manifest.clone())
        } else {
            Ok(format!("bytes of {path}").into_bytes())
        }
    });
    source
}

#[tokio::test]
async fn everything_already_on_target_uploads_nothing() {
    let mut source = source_with_manifest(package_json(&["pkgA==1.0.0"], &[]));
    source.expect_probe_exists().never();
    source.expect_marketplace_copy().never();

    let mut target = MockInstance::new();
    target.expect_probe_exists().returning(|path| {
        Ok(path == "tgt/solutions/app-1.0.0.ibsolution"
            || path == "tgt/deps/target_dependencies/pkgA-1.0.0.ibsolution")
    });
    target.expect_create_folder().returning(|_| Ok(()));
    target.expect_upload().never();
    target
        .expect_publish()
        .times(1)
        .returning(|path| Ok(json!({"published": path})));

    let report = migrate_solution(&source, &target, &plan(), &Timings::immediate())
        .await
        .unwrap();

    assert!(!report.uploaded);
    assert_eq!(report.sha256, None);
    assert_eq!(report.target_artifact, "tgt/solutions/app-1.0.0.ibsolution");
    assert_eq!(
        report.dependencies,
        vec!["tgt/deps/target_dependencies/pkgA-1.0.0.ibsolution".to_string()]
    );
    assert_eq!(report.published, report.dependencies);
}

#[tokio::test]
async fn failing_dependency_is_skipped() {
    let mut source = source_with_manifest(package_json(
        &["pkgA==1.0.0", "pkgC==0.3.0"],
        &["pkgB==2.0.0"],
    ));
    // Nothing is staged on the source yet; every dependency needs a marketplace copy.
    source.expect_probe_exists().returning(|_| Ok(false));
    source
        .expect_marketplace_copy()
        .times(3)
        .returning(|name, _, _| Ok(format!("job-{name}")));
    source.expect_job_status().returning(|job_id, _| {
        if job_id == "job-pkgB" {
            Ok(JobStatus::new("ERROR", ""))
        } else {
            Ok(JobStatus::new("OK", "DONE"))
        }
    });

    let uploads = Arc::new(Mutex::new(Vec::new()));
    let sink = uploads.clone();
    let mut target = MockInstance::new();
    target.expect_probe_exists().returning(|_| Ok(false));
    target.expect_create_folder().returning(|_| Ok(()));
    target.expect_upload().returning(move |path, _| {
        sink.lock().unwrap().push(path.to_string());
        Ok(())
    });
    target.expect_publish().returning(|_| Ok(json!({})));

    let report = migrate_solution(&source, &target, &plan(), &Timings::immediate())
        .await
        .unwrap();

    assert!(report.uploaded);
    assert_eq!(
        report.dependencies,
        vec![
            "tgt/deps/target_dependencies/pkgA-1.0.0.ibsolution".to_string(),
            "tgt/deps/target_dependencies/pkgC-0.3.0.ibsolution".to_string(),
        ]
    );
    assert_eq!(report.published.len(), 2);
    assert_eq!(
        *uploads.lock().unwrap(),
        vec![
            "tgt/solutions/app-1.0.0.ibsolution".to_string(),
            "tgt/deps/target_dependencies/pkgA-1.0.0.ibsolution".to_string(),
            "tgt/deps/target_dependencies/pkgC-0.3.0.ibsolution".to_string(),
        ]
    );
}

#[tokio::test]
async fn uploaded_artifact_carries_digest() {
    let source = source_with_manifest(package_json(&[], &[]));

    let mut target = MockInstance::new();
    target.expect_probe_exists().returning(|_| Ok(false));
    target.expect_create_folder().returning(|_| Ok(()));
    target
        .expect_upload()
        .withf(|path, data| {
            path == "tgt/solutions/app-1.0.0.ibsolution"
                && data.as_slice() == format!("bytes of {ARTIFACT}").as_bytes()
        })
        .times(1)
        .returning(|_, _| Ok(()));
    target.expect_publish().never();

    let report = migrate_solution(&source, &target, &plan(), &Timings::immediate())
        .await
        .unwrap();

    assert!(report.uploaded);
    let digest = report.sha256.unwrap();
    assert_eq!(digest.len(), 64);
    assert!(report.dependencies.is_empty());
}

#[tokio::test]
async fn unreadable_manifest_aborts_migration() {
    let source = source_with_manifest(b"not json".to_vec());

    let mut target = MockInstance::new();
    target.expect_probe_exists().returning(|_| Ok(true));
    target.expect_create_folder().never();
    target.expect_publish().never();

    let err = migrate_solution(&source, &target, &plan(), &Timings::immediate())
        .await
        .unwrap_err();
    assert!(matches!(err, PromoteError::Json(_)));
}

#[tokio::test]
async fn models_override_dev_packages_in_embedded_manifest() {
    let source = source_with_manifest(package_json(&["shared==2.0.0"], &["shared==1.0.0", "tool==0.1.0"]));

    let manifest = read_embedded_manifest(&source, ARTIFACT, "src/staging", &Timings::immediate())
        .await
        .unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.get("shared"), Some(&ArtifactVersion::new(2, 0, 0)));
}

#[tokio::test]
async fn staged_dependency_skips_marketplace_copy() {
    let mut source = MockInstance::new();
    source.expect_create_folder().returning(|_| Ok(()));
    source
        .expect_probe_exists()
        .withf(|path| path == "src/staging/source_dependencies/pkgA-1.0.0.ibsolution")
        .returning(|_| Ok(true));
    source.expect_marketplace_copy().never();
    source.expect_read().times(1).returning(|_| Ok(vec![1, 2, 3]));

    let mut target = MockInstance::new();
    target.expect_create_folder().returning(|_| Ok(()));
    target.expect_probe_exists().returning(|_| Ok(false));
    target
        .expect_upload()
        .withf(|_, data| *data == vec![1u8, 2, 3])
        .times(1)
        .returning(|_, _| Ok(()));

    let mut manifest = DependencyManifest::new();
    manifest.insert("pkgA", ArtifactVersion::new(1, 0, 0));
    let paths = migrate_dependencies(
        &source,
        &target,
        &manifest,
        "src/staging",
        "tgt/deps",
        &Timings::immediate(),
    )
    .await
    .unwrap();
    assert_eq!(paths, vec!["tgt/deps/target_dependencies/pkgA-1.0.0.ibsolution".to_string()]);
}

#[tokio::test]
async fn publish_failures_are_left_out() {
    let mut api = MockInstance::new();
    api.expect_publish().returning(|path| {
        if path.contains("bad") {
            Err(PromoteError::remote_write("publish", path, "status 500"))
        } else {
            Ok(json!({"status": "OK"}))
        }
    });

    let published = publish_all(&api, &["a.ibsolution".to_string(), "bad.ibsolution".to_string()]).await;
    assert_eq!(published, vec!["a.ibsolution".to_string()]);
}

#[tokio::test]
async fn deploy_uses_latest_artifact() {
    let mut api = MockInstance::new();
    api.expect_list().returning(|_| {
        Ok(vec![
            "tgt/solutions/app-1.0.0.ibsolution".to_string(),
            "tgt/solutions/app-1.0.1.ibsolution".to_string(),
        ])
    });
    api.expect_deploy()
        .withf(|path| path == "tgt/solutions/app-1.0.1.ibsolution")
        .times(1)
        .returning(|_| Ok(Some("deploy-7".to_string())));

    let (path, job) = deploy_latest(&api, "tgt/solutions", None).await.unwrap();
    assert_eq!(path, "tgt/solutions/app-1.0.1.ibsolution");
    assert_eq!(job.as_deref(), Some("deploy-7"));
}
