//! Flash plan construction
//!
//! A plan is the join of a device's partition table with the images a
//! package binds. It is built and validated in full before anything is
//! written to the device.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::package::FlashPackage;
use super::partition::PartitionRole;
use super::registry::DeviceProfile;
use crate::error::FlashError;

/// A/B slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Slot A
    A,
    /// Slot B
    B,
}

impl Slot {
    /// Partition name suffix, e.g. `_a`
    pub fn suffix(self) -> &'static str {
        match self {
            Self::A => "_a",
            Self::B => "_b",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "a",
            Self::B => "b",
        })
    }
}

/// Which slots an A/B device gets written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPolicy {
    /// Same image to both slots
    #[default]
    Both,
    /// Only the given slot
    Only(Slot),
}

impl SlotPolicy {
    fn slots(self) -> &'static [Slot] {
        match self {
            Self::Both => &[Slot::A, Slot::B],
            Self::Only(Slot::A) => &[Slot::A],
            Self::Only(Slot::B) => &[Slot::B],
        }
    }
}

/// Options that shape plan construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Slot selection for A/B devices
    pub slots: SlotPolicy,
    /// Erase userdata/cache partitions the package does not write
    pub wipe_data: bool,
}

/// What a step does to its partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepAction {
    /// Write an image
    Write {
        /// Image file
        image: PathBuf,
    },
    /// Erase the partition
    Erase,
}

/// One ordered plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// Partition name passed to the backend (slot suffix included)
    pub partition: String,
    /// Role of the logical partition
    pub role: PartitionRole,
    /// Slot, for A/B expansion
    pub slot: Option<Slot>,
    /// Action
    #[serde(flatten)]
    pub action: StepAction,
}

impl PlanStep {
    /// Image for write steps
    pub fn image(&self) -> Option<&Path> {
        match &self.action {
            StepAction::Write { image } => Some(image),
            StepAction::Erase => None,
        }
    }
}

/// Ordered, validated list of flash steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashPlan {
    steps: Vec<PlanStep>,
}

impl FlashPlan {
    /// Steps in execution order
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check that every write step's image exists
    pub fn validate(&self) -> Result<(), FlashError> {
        for step in &self.steps {
            if let Some(image) = step.image() {
                if !image.is_file() {
                    return Err(FlashError::MissingImage {
                        partition: step.partition.clone(),
                        path: image.to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Build the plan for `profile` from the images in `package`
///
/// Walks the partition table in order. A/B devices get one write per
/// selected slot; wipe steps are appended after all writes, never slotted.
pub fn build_plan(
    profile: &DeviceProfile,
    package: &FlashPackage,
    options: PlanOptions,
) -> Result<FlashPlan, FlashError> {
    let mut steps = Vec::new();

    for entry in &profile.partitions {
        let Some(image) = package.image(entry.role) else {
            continue;
        };

        if profile.supports_ab {
            for slot in options.slots.slots() {
                steps.push(PlanStep {
                    partition: format!("{}{}", entry.name, slot.suffix()),
                    role: entry.role,
                    slot: Some(*slot),
                    action: StepAction::Write {
                        image: image.to_path_buf(),
                    },
                });
            }
        } else {
            steps.push(PlanStep {
                partition: entry.name.clone(),
                role: entry.role,
                slot: None,
                action: StepAction::Write {
                    image: image.to_path_buf(),
                },
            });
        }
    }

    if steps.is_empty() {
        return Err(FlashError::EmptyPlan {
            codename: profile.codename.clone(),
        });
    }

    if options.wipe_data {
        for entry in &profile.partitions {
            if entry.role.is_wipeable() && package.image(entry.role).is_none() {
                steps.push(PlanStep {
                    partition: entry.name.clone(),
                    role: entry.role,
                    slot: None,
                    action: StepAction::Erase,
                });
            }
        }
    }

    let plan = FlashPlan { steps };
    plan.validate()?;
    Ok(plan)
}
