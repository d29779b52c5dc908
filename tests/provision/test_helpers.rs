//! Shared fixtures for provisioning BDD scenarios.

use provisioner::test_support::RecordingFactory;
use provisioner::{
    ExecutionReport, HostTarget, PlanError, ProvisionError, ProvisioningPlan, StartupShell, Step,
    WorkDir,
};
use rstest::fixture;

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub factory: RecordingFactory,
    pub target: HostTarget,
    pub plan: Option<ProvisioningPlan>,
    pub outcome: Option<Result<ExecutionReport, ProvisionError>>,
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    ProvisionContext {
        factory: RecordingFactory::new(),
        target: HostTarget::new("default", "ssh_config"),
        plan: None,
        outcome: None,
    }
}

/// Seven steps: two package installs, download, extract, build and install
/// inside the extracted directory, then the environment line.
pub fn imagemagick_plan() -> Result<ProvisioningPlan, PlanError> {
    let dir = WorkDir::glob("ImageMagick-*")?;
    Ok(ProvisioningPlan::new(
        "imagemagick",
        vec![
            Step::sudo("apt-get -q -y install git"),
            Step::sudo("apt-get -q -y install build-essential"),
            Step::run("wget -q https://www.imagemagick.org/download/ImageMagick.tar.gz"),
            Step::run("tar zxf ImageMagick.tar.gz"),
            Step::run("./configure && make").in_dir(dir.clone()),
            Step::sudo("make install").in_dir(dir),
            Step::append_env(StartupShell::Bash, "LIBCLANG_PATH", "/usr/lib/llvm-3.8/lib"),
        ],
    ))
}
