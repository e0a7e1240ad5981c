use merge_model::model::{DeclarationEnv, MergeTargetRecord};
use serde::{Deserialize, Serialize};

#[derive(clap::Args, Debug, Clone, Deserialize, Serialize, Default)]
#[clap(next_help_heading = "Filtering Options")]
pub struct TargetFilterOptions {
    /// Specify merge targets to resolve, by simple or fully qualified name
    #[clap(long = "targets", global = true, value_delimiter = ',')]
    pub targets: Option<Vec<String>>,

    /// Specify packages whose merge targets are resolved
    #[clap(long = "packages", global = true, value_delimiter = ',')]
    pub packages: Option<Vec<String>>,
}

fn names_target(name: &str, target: &MergeTargetRecord) -> bool {
    name == target.target_type.as_str() || name == target.target_type.simple_name()
}

impl TargetFilterOptions {
    pub fn is_targeted(&self, target: &MergeTargetRecord) -> bool {
        if let Some(packages) = &self.packages {
            if !packages.contains(&target.package) {
                return false;
            }
        }

        if let Some(targets) = &self.targets {
            targets.iter().any(|name| names_target(name, target))
        } else {
            true
        }
    }

    pub fn check_filter_correctness(&self, env: &DeclarationEnv) -> Option<String> {
        if let Some(packages) = &self.packages {
            for package in packages {
                if !env.get_merge_targets().any(|t| &t.package == package) {
                    return Some(format!("Package `{}` has no merge targets", package));
                }
            }
        }

        if let Some(targets) = &self.targets {
            let candidates = env
                .get_merge_targets()
                .filter(|t| {
                    self.packages
                        .as_ref()
                        .map_or(true, |packages| packages.contains(&t.package))
                })
                .collect::<Vec<_>>();

            for name in targets {
                if !candidates.iter().any(|t| names_target(name, t)) {
                    return Some(format!("Merge target `{}` does not exist", name));
                }
            }
        }

        None
    }
}
