//! Built-in host profiles: the plans that prepare a fresh virtual machine
//! to build ImageMagick bindings.
//!
//! Every profile exposes a single task, `all`. The steps are data; nothing
//! here talks to a host.

use std::fmt;
use std::str::FromStr;

use crate::plan::{PlanError, ProvisioningPlan, StartupShell, Step, WorkDir};
use crate::render::DEFAULT_SHELL;

/// Task every profile provides.
pub const DEFAULT_TASK: &str = "all";

const IMAGEMAGICK_DIR: &str = "ImageMagick-*";

/// A supported guest operating system.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    /// FreeBSD 10 using prebuilt packages.
    FreeBsd10,
    /// Ubuntu 14.04, building ImageMagick from the latest tarball.
    Ubuntu14,
    /// Ubuntu 16.04, building a pinned ImageMagick release.
    Ubuntu16,
}

impl Profile {
    /// Every profile, in listing order.
    pub const ALL: [Self; 3] = [Self::FreeBsd10, Self::Ubuntu14, Self::Ubuntu16];

    /// Name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FreeBsd10 => "freebsd10",
            Self::Ubuntu14 => "ubuntu14",
            Self::Ubuntu16 => "ubuntu16",
        }
    }

    /// One-line description for `provision list`.
    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            Self::FreeBsd10 => "FreeBSD 10: packages for Rust, ImageMagick and libclang",
            Self::Ubuntu14 => "Ubuntu 14.04: rustup.sh and ImageMagick from source",
            Self::Ubuntu16 => "Ubuntu 16.04: rustup-init and ImageMagick 6.9.8-10 from source",
        }
    }

    /// Shell prefix steps run under on this guest.
    ///
    /// FreeBSD's default login shell is `csh`, so steps go through `/bin/sh`.
    #[must_use]
    pub const fn shell(self) -> &'static str {
        match self {
            Self::FreeBsd10 => "/bin/sh -c",
            Self::Ubuntu14 | Self::Ubuntu16 => DEFAULT_SHELL,
        }
    }

    /// Tasks the profile exposes.
    #[must_use]
    pub const fn tasks(self) -> &'static [&'static str] {
        &[DEFAULT_TASK]
    }

    /// Builds the plan for `task`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnknownTask`] for tasks other than `all`, or
    /// [`PlanError::InvalidPattern`] if a working-directory glob is malformed.
    pub fn plan(self, task: &str) -> Result<ProvisioningPlan, PlanError> {
        if task != DEFAULT_TASK {
            return Err(PlanError::UnknownTask {
                profile: self.name().to_owned(),
                task: task.to_owned(),
            });
        }

        let steps = match self {
            Self::FreeBsd10 => freebsd10(),
            Self::Ubuntu14 => ubuntu14()?,
            Self::Ubuntu16 => ubuntu16()?,
        };
        Ok(ProvisioningPlan::new(format!("{self}:{task}"), steps))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = PlanError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.name() == name.trim())
            .ok_or_else(|| PlanError::UnknownProfile(name.to_owned()))
    }
}

fn freebsd10() -> Vec<Step> {
    vec![
        Step::sudo("pkg install -q -y git"),
        Step::sudo("pkg install -q -y rust"),
        Step::sudo("pkg install -q -y cargo"),
        Step::sudo("pkg install -q -y ImageMagick-nox11"),
        Step::sudo("pkg install pkgconf"),
        Step::sudo("pkg install -q -y clang-devel"),
        Step::append_env(
            StartupShell::Csh,
            "LIBCLANG_PATH",
            "/usr/local/llvm-devel/lib",
        ),
    ]
}

fn ubuntu14() -> Result<Vec<Step>, PlanError> {
    let mut steps = vec![
        Step::run("sudo apt-get -q -y install git"),
        Step::run("wget -q https://static.rust-lang.org/rustup.sh"),
        Step::run("chmod +x rustup.sh"),
        Step::run("./rustup.sh --yes"),
        Step::run("rm -f rustup.sh"),
        Step::sudo("apt-get -q -y build-dep imagemagick"),
        Step::run("wget -q http://www.imagemagick.org/download/ImageMagick.tar.gz"),
        Step::run("tar zxf ImageMagick.tar.gz"),
    ];
    steps.extend(build_imagemagick()?);
    steps.push(Step::run("rm -rf ImageMagick*"));
    steps.push(Step::run("sudo apt-get -q -y install libclang-dev"));
    Ok(steps)
}

fn ubuntu16() -> Result<Vec<Step>, PlanError> {
    let mut steps = vec![
        Step::sudo("apt-get -q -y install git"),
        Step::sudo("apt-get -q -y install pkg-config"),
        Step::run("wget -O rustup-init https://sh.rustup.rs"),
        Step::run("chmod +x rustup-init"),
        Step::run("./rustup-init -y"),
        Step::run("rm -f rustup-init"),
        Step::sudo("apt-get -q -y build-dep imagemagick"),
        Step::run("wget -q https://www.imagemagick.org/download/ImageMagick-6.9.8-10.tar.gz"),
        Step::run("tar zxf ImageMagick-6.9.8-10.tar.gz"),
    ];
    steps.extend(build_imagemagick()?);
    steps.push(Step::run("rm -rf ImageMagick*"));
    steps.push(Step::sudo("apt-get -q -y install clang libclang-dev"));
    steps.push(Step::append_env(
        StartupShell::Bash,
        "LIBCLANG_PATH",
        "/usr/lib/llvm-3.8/lib",
    ));
    Ok(steps)
}

fn build_imagemagick() -> Result<[Step; 3], PlanError> {
    let dir = WorkDir::glob(IMAGEMAGICK_DIR)?;
    Ok([
        Step::run("./configure").in_dir(dir.clone()),
        Step::run("make").in_dir(dir.clone()),
        Step::sudo("make install").in_dir(dir),
    ])
}
