//! Using-directive tracking for one emitted file
//!
//! Every namespace a file references is sorted into one of five buckets,
//! emitted in a fixed order with each bucket alphabetical:
//!
//! 1. standard target-runtime namespaces (`System`, `System.*`)
//! 2. vendor/platform namespaces (configured prefixes, `Microsoft`, `Windows`)
//! 3. third-party namespaces (everything else outside the project)
//! 4. the runtime support namespace, always present
//! 5. local project namespaces under the root namespace
//!
//! ## Usage
//!
//! ```ignore
//! let mut usings = UsingTracker::new("My.App.models", &config);
//! usings.add_all(&file.references);
//! for line in usings.lines() {
//!     writeln!(output, "{}", line)?;
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use sharpen_core::config::TranspileConfig;
use sharpen_core::symbols::has_namespace_prefix;

/// Bucket order is the emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UsingBucket {
    Standard,
    Vendor,
    ThirdParty,
    Runtime,
    Local,
}

#[derive(Debug)]
pub struct UsingTracker<'a> {
    /// The namespace of the file being emitted; never imported
    own_namespace: String,
    config: &'a TranspileConfig,
    buckets: BTreeMap<UsingBucket, BTreeSet<String>>,
}

impl<'a> UsingTracker<'a> {
    pub fn new(own_namespace: impl Into<String>, config: &'a TranspileConfig) -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(
            UsingBucket::Runtime,
            BTreeSet::from([config.runtime_namespace().to_string()]),
        );
        Self {
            own_namespace: own_namespace.into(),
            config,
            buckets,
        }
    }

    /// Which bucket `namespace` belongs in
    pub fn classify(&self, namespace: &str) -> UsingBucket {
        if has_namespace_prefix(namespace, self.config.runtime_namespace()) {
            UsingBucket::Runtime
        } else if has_namespace_prefix(namespace, "System") {
            UsingBucket::Standard
        } else if self
            .config
            .vendor_prefixes()
            .iter()
            .any(|prefix| has_namespace_prefix(namespace, prefix))
        {
            UsingBucket::Vendor
        } else if self.config.is_local_namespace(namespace) {
            UsingBucket::Local
        } else {
            UsingBucket::ThirdParty
        }
    }

    /// Record a referenced namespace
    pub fn add(&mut self, namespace: &str) {
        if namespace.is_empty() || namespace == self.own_namespace {
            return;
        }
        let bucket = self.classify(namespace);
        // enclosing namespaces of the file's own namespace are already in scope
        if bucket == UsingBucket::Local
            && self.config.optimization().omit_redundant_usings
            && has_namespace_prefix(&self.own_namespace, namespace)
        {
            return;
        }
        self.buckets
            .entry(bucket)
            .or_default()
            .insert(namespace.to_string());
    }

    pub fn add_all<'n>(&mut self, namespaces: impl IntoIterator<Item = &'n String>) {
        for namespace in namespaces {
            self.add(namespace);
        }
    }

    pub fn bucket(&self, bucket: UsingBucket) -> impl Iterator<Item = &str> {
        self.buckets
            .get(&bucket)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// `using X;` lines, buckets separated by one blank line
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for set in self.buckets.values().filter(|set| !set.is_empty()) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(set.iter().map(|ns| format!("using {};", ns)));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TranspileConfig {
        TranspileConfig::builder()
            .root_namespace("My.App")
            .build()
            .unwrap()
    }

    #[test]
    fn test_bucket_classification() {
        let config = config();
        let usings = UsingTracker::new("My.App.models", &config);
        assert_eq!(usings.classify("System"), UsingBucket::Standard);
        assert_eq!(usings.classify("System.Collections.Generic"), UsingBucket::Standard);
        assert_eq!(usings.classify("SystemX"), UsingBucket::ThirdParty);
        assert_eq!(usings.classify("Microsoft.Extensions.Logging"), UsingBucket::Vendor);
        assert_eq!(usings.classify("Newtonsoft.Json"), UsingBucket::ThirdParty);
        assert_eq!(usings.classify("Sharpen.Runtime"), UsingBucket::Runtime);
        assert_eq!(usings.classify("My.App.utils"), UsingBucket::Local);
    }

    #[test]
    fn test_runtime_namespace_always_present() {
        let config = config();
        let usings = UsingTracker::new("My.App", &config);
        assert_eq!(usings.lines(), vec!["using Sharpen.Runtime;"]);
    }

    #[test]
    fn test_bucket_order_and_dedup() {
        let config = config();
        let mut usings = UsingTracker::new("My.App.models", &config);
        for ns in [
            "My.App.utils",
            "System.Threading.Tasks",
            "Newtonsoft.Json",
            "System",
            "Microsoft.Extensions.Logging",
            "System",
            "My.App.models",
        ] {
            usings.add(ns);
        }
        assert_eq!(
            usings.lines(),
            vec![
                "using System;",
                "using System.Threading.Tasks;",
                "",
                "using Microsoft.Extensions.Logging;",
                "",
                "using Newtonsoft.Json;",
                "",
                "using Sharpen.Runtime;",
                "",
                "using My.App.utils;",
            ]
        );
    }

    #[test]
    fn test_own_namespace_never_imported() {
        let config = config();
        let mut usings = UsingTracker::new("My.App.utils", &config);
        usings.add("My.App.utils");
        assert_eq!(usings.bucket(UsingBucket::Local).count(), 0);
    }
}
