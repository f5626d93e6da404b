use crate::advisory::Advisory;
use crate::database::Database;
use crate::report::{Report, ScanResult};
use crate::resolver::{is_internal_host, HostResolver, SystemResolver};
use crate::types::{Dependency, Lockfile, Source, SourceKind};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

pub struct Scanner<'a> {
    database: &'a Database,
    dependencies: Vec<Dependency>,
    sources: Vec<Source>,
    ignore: HashSet<String>,
    consider_git_uris_safe: bool,
    resolver: Box<dyn HostResolver>,
}

impl<'a> Scanner<'a> {
    pub fn new(database: &'a Database, lockfile: Lockfile) -> Self {
        Self {
            database,
            dependencies: lockfile.dependencies,
            sources: lockfile.sources,
            ignore: HashSet::new(),
            consider_git_uris_safe: false,
            resolver: Box::new(SystemResolver::new()),
        }
    }

    /// Advisory identifiers to leave out of the results. Any identifier form
    /// an advisory answers to (`CVE-…`, `OSVDB-…`, `GHSA-…`, record id) works.
    pub fn with_ignore<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(identifiers.into_iter().map(Into::into));
        self
    }

    /// Trust `git://` sources regardless of where they point.
    pub fn consider_git_uris_safe(mut self, safe: bool) -> Self {
        self.consider_git_uris_safe = safe;
        self
    }

    pub fn with_resolver(mut self, resolver: impl HostResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn scan(&self) -> impl Iterator<Item = ScanResult> + '_ {
        self.scan_sources().chain(self.scan_dependencies())
    }

    pub fn scan_sources(&self) -> impl Iterator<Item = ScanResult> + '_ {
        let mut internal_hosts: HashMap<String, bool> = HashMap::new();

        self.sources.iter().filter_map(move |source| {
            if self.is_insecure(source, &mut internal_hosts) {
                debug!(uri = %source.uri, kind = %source.kind, "insecure source");
                Some(ScanResult::InsecureSource {
                    uri: source.uri.clone(),
                })
            } else {
                None
            }
        })
    }

    pub fn scan_dependencies(&self) -> impl Iterator<Item = ScanResult> + '_ {
        self.dependencies.iter().flat_map(move |dependency| {
            self.database
                .check(&dependency.name, &dependency.version)
                .filter(move |advisory| !self.is_ignored(advisory))
                .map(move |advisory| {
                    debug!(
                        gem = %dependency.name,
                        version = %dependency.version,
                        advisory = advisory.id(),
                        "unpatched dependency"
                    );
                    ScanResult::UnpatchedDependency {
                        name: dependency.name.clone(),
                        version: dependency.version.clone(),
                        advisory: Box::new(advisory),
                    }
                })
        })
    }

    pub fn report(&self) -> Report {
        self.scan().collect()
    }

    fn is_ignored(&self, advisory: &Advisory) -> bool {
        let ignored = self
            .ignore
            .iter()
            .any(|identifier| advisory.matches_identifier(identifier));
        if ignored {
            debug!(advisory = advisory.id(), "ignoring advisory");
        }
        ignored
    }

    fn is_insecure(&self, source: &Source, internal_hosts: &mut HashMap<String, bool>) -> bool {
        let (scheme, host) = split_uri(&source.uri);

        let insecure_transport = match source.kind {
            SourceKind::Git => {
                scheme == "http" || (scheme == "git" && !self.consider_git_uris_safe)
            }
            SourceKind::Registry => scheme == "http",
        };
        if !insecure_transport {
            return false;
        }

        let Some(host) = host else {
            return true;
        };

        let internal = *internal_hosts
            .entry(host.clone())
            .or_insert_with(|| is_internal_host(self.resolver.as_ref(), &host));
        !internal
    }
}

/// Lower-cased scheme and host of `uri`. Strings the URL parser rejects
/// still yield their scheme prefix but no host.
fn split_uri(uri: &str) -> (String, Option<String>) {
    match Url::parse(uri) {
        Ok(url) => (
            url.scheme().to_string(),
            url.host_str().filter(|h| !h.is_empty()).map(str::to_string),
        ),
        Err(_) => {
            let scheme = uri
                .split_once(':')
                .map(|(scheme, _)| scheme.to_ascii_lowercase())
                .unwrap_or_default();
            (scheme, None)
        }
    }
}
