use std::fs;

use solution_promote::cli::{PromoteArgs, PromoteSbArgs};
use solution_promote::commands::{download_latest, migration_plan, promote, promote_sb};
use solution_promote_core::config::{InstanceConfig, PromoteConfig, Timings};
use solution_promote_core::contract::{MockInstance, MockRemoteFileAccess};
use solution_promote_core::error::PromoteError;

fn config() -> PromoteConfig {
    let mut config = PromoteConfig::new(
        InstanceConfig::new("https://dev.example.com", "dev"),
        InstanceConfig::new("https://prod.example.com", "prod"),
    );
    config.timings = Timings::immediate();
    config
}

#[tokio::test]
async fn promote_copies_latest_to_target() {
    let mut config = config();
    config.paths.source_compiled_solutions_path = Some("dev/out".into());
    config.paths.target_path = Some("prod/in".into());

    let mut source = MockInstance::new();
    source.expect_list().returning(|_| {
        Ok(vec![
            "dev/out/app-1.0.0.ibsolution".to_string(),
            "dev/out/app-1.1.0.ibsolution".to_string(),
        ])
    });
    source
        .expect_read()
        .withf(|path| path == "dev/out/app-1.1.0.ibsolution")
        .times(1)
        .returning(|_| Ok(b"zip".to_vec()));

    let mut target = MockInstance::new();
    target.expect_probe_exists().returning(|_| Ok(false));
    target
        .expect_upload()
        .withf(|path, data| path == "prod/in/app-1.1.0.ibsolution" && data == b"zip")
        .times(1)
        .returning(|_, _| Ok(()));

    let args = PromoteArgs {
        promote_solution_to_target: true,
        ..PromoteArgs::default()
    };
    let dir = tempfile::tempdir().unwrap();
    promote(&source, &target, &config, &args, dir.path()).await.unwrap();
}

#[tokio::test]
async fn promote_without_required_path_fails_before_remote_calls() {
    let source = MockInstance::new();
    let target = MockInstance::new();
    let args = PromoteArgs {
        publish_target_solution: true,
        ..PromoteArgs::default()
    };
    let dir = tempfile::tempdir().unwrap();

    let err = promote(&source, &target, &config(), &args, dir.path()).await.unwrap_err();
    assert!(err.to_string().contains("TARGET_IB_PATH"));
}

#[tokio::test]
async fn rejected_marketplace_publish_does_not_abort_promote() {
    let mut config = config();
    config.paths.source_compiled_solutions_path = Some("dev/out".into());

    let mut source = MockInstance::new();
    source
        .expect_list()
        .returning(|_| Ok(vec!["dev/out/app-1.0.0.ibsolution".to_string()]));
    source
        .expect_publish()
        .withf(|path| path == "dev/out/app-1.0.0.ibsolution")
        .times(1)
        .returning(|path| Err(PromoteError::remote_write("publish", path, "500")));
    let target = MockInstance::new();

    let args = PromoteArgs {
        publish_source_solution: true,
        marketplace: true,
        ..PromoteArgs::default()
    };
    let dir = tempfile::tempdir().unwrap();
    promote(&source, &target, &config, &args, dir.path()).await.unwrap();
}

#[tokio::test]
async fn promote_sb_exports_latest_target_version() {
    let env_file = tempfile::NamedTempFile::new().unwrap();
    let mut config = config();
    config.paths.target_path = Some("prod/in".into());
    config.paths.solution_builder_name = Some("invoice".into());
    config.paths.github_env = Some(env_file.path().to_string_lossy().into_owned());

    let source = MockInstance::new();
    let mut target = MockInstance::new();
    target.expect_list().returning(|_| {
        Ok(vec![
            "prod/in/invoice-0.0.9.ibsolution".to_string(),
            "prod/in/invoice-0.0.10.ibsolution".to_string(),
            "prod/in/other-5.0.0.ibsolution".to_string(),
        ])
    });

    let args = PromoteSbArgs {
        set_github_actions_env_var: true,
        ..PromoteSbArgs::default()
    };
    let dir = tempfile::tempdir().unwrap();
    promote_sb(&source, &target, &config, &args, dir.path()).await.unwrap();

    assert_eq!(
        fs::read_to_string(env_file.path()).unwrap(),
        "PACKAGE_VERSION=0.0.10\n"
    );
}

#[tokio::test]
async fn promote_sb_deploys_filtered_target_artifact() {
    let mut config = config();
    config.paths.target_path = Some("prod/in".into());
    config.paths.solution_builder_name = Some("invoice".into());

    let source = MockInstance::new();
    let mut target = MockInstance::new();
    target.expect_list().returning(|_| {
        Ok(vec![
            "prod/in/invoice-1.0.0.ibsolution".to_string(),
            "prod/in/zeta-9.0.0.ibsolution".to_string(),
        ])
    });
    target
        .expect_deploy()
        .withf(|path| path == "prod/in/invoice-1.0.0.ibsolution")
        .times(1)
        .returning(|_| Ok(None));

    let args = PromoteSbArgs {
        deploy_target_solution: true,
        ..PromoteSbArgs::default()
    };
    let dir = tempfile::tempdir().unwrap();
    promote_sb(&source, &target, &config, &args, dir.path()).await.unwrap();
}

#[tokio::test]
async fn download_writes_latest_artifact_locally() {
    let mut files = MockRemoteFileAccess::new();
    files
        .expect_list()
        .returning(|_| Ok(vec!["prod/in/app-2.0.0.ibsolution".to_string()]));
    files.expect_read().returning(|_| Ok(vec![1, 2, 3]));

    let dir = tempfile::tempdir().unwrap();
    let local = download_latest(&files, "prod/in", None, dir.path()).await.unwrap();

    assert_eq!(local, dir.path().join("app-2.0.0.ibsolution"));
    assert_eq!(fs::read(&local).unwrap(), vec![1u8, 2, 3]);
}

#[test]
fn migration_plan_defaults_staging_to_build_parent() {
    let mut config = config();
    config.paths.solution_build_dir_path = Some("dev/ws/fs/Drive/build".into());
    config.paths.target_path = Some("prod/ws/fs/Drive/solutions".into());

    let plan = migration_plan(&config).unwrap();
    assert_eq!(plan.source_folder, "dev/ws/fs/Drive/build");
    assert_eq!(plan.source_staging_folder, "dev/ws/fs/Drive");
    assert_eq!(plan.target_dependencies_parent, "prod/ws/fs/Drive/solutions");
    assert_eq!(plan.name_filter, None);

    config.paths.source_working_dir = Some("dev/ws/fs/Drive/tmp".into());
    assert_eq!(migration_plan(&config).unwrap().source_staging_folder, "dev/ws/fs/Drive/tmp");
}
