//! Platform capability report

use serde::Serialize;

use glassbox_common::{Capabilities, Platform};

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Serialize)]
struct PlatformReport {
    platform: Platform,
    name: &'static str,
    #[serde(flatten)]
    capabilities: Capabilities,
}

impl TableDisplay for PlatformReport {
    fn headers() -> Vec<&'static str> {
        vec!["Platform", "Virtual display", "Xvfb helper"]
    }

    fn row(&self) -> Vec<String> {
        let yes_no = |b: bool| if b { "yes" } else { "no (native display)" }.to_string();
        vec![
            self.name.to_string(),
            yes_no(self.capabilities.virtual_display),
            yes_no(self.capabilities.helper_process),
        ]
    }
}

pub fn execute(format: OutputFormat) {
    let platform = Platform::current();
    let report = PlatformReport {
        platform,
        name: platform.name(),
        capabilities: platform.capabilities(),
    };
    print_item(&report, format);
}
