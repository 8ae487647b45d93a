use std::path::{Path, PathBuf};

pub const SCRIPTS_DIR: &str = "scripts";
pub const RESULTS_DIR: &str = "results";
pub const LOGS_DIR: &str = "logs";
pub const TEMP_DIR: &str = "temp";

pub fn out_ocean(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.ocn"))
}

pub fn out_netlist_ocean(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}_netlist.ocn"))
}

/// Shell wrapper of the given kind (`ocean`, `netlist` or `batch`).
pub fn out_shell(work_dir: impl AsRef<Path>, name: &str, kind: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("run_{name}_{kind}.sh"))
}

/// Subdirectory the simulation wrapper runs in.
pub fn out_run_dir(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}_run"))
}

pub fn out_run_log(work_dir: impl AsRef<Path>, stamp: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref())
        .join(LOGS_DIR)
        .join(format!("simulation_{stamp}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_project() {
        assert_eq!(out_ocean("/w", "lib_cell"), PathBuf::from("/w/lib_cell.ocn"));
        assert_eq!(
            out_netlist_ocean("/w", "lib_cell"),
            PathBuf::from("/w/lib_cell_netlist.ocn")
        );
        assert_eq!(
            out_shell("/w", "lib_cell", "batch"),
            PathBuf::from("/w/run_lib_cell_batch.sh")
        );
        assert_eq!(
            out_run_log("/w", "20260101_120000"),
            PathBuf::from("/w/logs/simulation_20260101_120000.log")
        );
    }
}
