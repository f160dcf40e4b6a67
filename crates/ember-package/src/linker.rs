//! Mounted packages and the linker that loads objects out of them.
//!
//! A [`PackageLinker`] owns every mounted [`Package`]. Objects are loaded
//! lazily: mounting only parses the tables, and an export's payload is read
//! the first time the export is requested, either directly through
//! [`PackageLinker::load_object`] or because an object being loaded
//! references it. References into other packages go through the import
//! table and may mount further packages from the linker's sources.
//!
//! An export is marked [`ExportState::Loading`] before its payload is read,
//! so a reference cycle back to it resolves to the object under
//! construction instead of recursing. If the payload then fails to load,
//! references to the half-loaded object are cleared from every other
//! constructed export before the error is returned.
//!
//! The linker keeps each object's [`ObjectFlags`] current: exports are
//! `PUBLIC`, an object being loaded is `NEEDS_LOAD` until its payload has
//! been read, and a loaded one is `WAS_LOADED`. Saving writes references to
//! `TRANSIENT` objects as null.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ember_archive::{
    Archive, MemoryReader, MemoryWriter, PackageIndex, PackageIndexArchive, PackageResolver,
    ReferenceCollector, ReferenceReplacer,
};
use ember_arena::ObjectPtr;
use ember_core::{ObjectFlags, ObjectHandle};
use ember_reflect::ObjectContext;
use indexmap::IndexMap;

use crate::error::PackageError;
use crate::format::{archive_result, read_tables, ExportEntry, ImportEntry, PackageHeader};
use crate::source::PackageSource;

/// Load progress of one export.
#[derive(Clone, Debug, Default)]
pub enum ExportState {
    /// Payload not read yet.
    #[default]
    Unloaded,
    /// Object constructed, payload being read.
    Loading(ObjectPtr),
    /// Object fully loaded and `post_load` has run.
    Loaded(ObjectPtr),
}

impl ExportState {
    /// The export's object, if it has been constructed.
    pub fn object(&self) -> Option<&ObjectPtr> {
        match self {
            Self::Unloaded => None,
            Self::Loading(object) | Self::Loaded(object) => Some(object),
        }
    }

    /// Whether the export finished loading.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// An object a package provides.
#[derive(Clone, Debug)]
pub struct Export {
    object_name: String,
    class_name: String,
    offset: u64,
    size: u64,
    state: ExportState,
}

impl Export {
    /// Export name, unique within its package.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Registered class of the object.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Absolute position of the payload in the package data. Zero for
    /// exports added in memory.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Payload length in bytes. Zero for exports added in memory.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Load progress.
    pub fn state(&self) -> &ExportState {
        &self.state
    }
}

/// A named set of exports plus the imports their payloads refer to.
#[derive(Clone, Debug)]
pub struct Package {
    name: String,
    data: Arc<[u8]>,
    imports: Vec<ImportEntry>,
    exports: Vec<Export>,
}

impl Package {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Arc::from(Vec::new()),
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Import table, empty for packages created in memory.
    pub fn imports(&self) -> &[ImportEntry] {
        &self.imports
    }

    /// Export table in index order.
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Export table position of `object_name`.
    pub fn find_export(&self, object_name: &str) -> Option<usize> {
        self.exports
            .iter()
            .position(|e| e.object_name == object_name)
    }

    /// Export named `object_name`.
    pub fn export(&self, object_name: &str) -> Option<&Export> {
        self.find_export(object_name).map(|i| &self.exports[i])
    }

    /// Size of the mounted data in bytes.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Mounts packages and loads, links and saves their objects.
pub struct PackageLinker {
    context: ObjectContext,
    packages: IndexMap<String, Package>,
    sources: Vec<Box<dyn PackageSource>>,
}

impl std::fmt::Debug for PackageLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageLinker")
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}

impl PackageLinker {
    /// Create a linker that constructs objects in `context`.
    pub fn new(context: ObjectContext) -> Self {
        Self {
            context,
            packages: IndexMap::new(),
            sources: Vec::new(),
        }
    }

    /// The object context loaded objects are created in.
    pub fn context(&self) -> &ObjectContext {
        &self.context
    }

    /// Add a source consulted, after those added earlier, when a package
    /// that is not mounted is requested.
    pub fn add_source(&mut self, source: impl PackageSource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Mounted package `name`.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Whether package `name` is mounted.
    pub fn is_mounted(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Names of mounted packages in mount order.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Create an empty in-memory package to add exports to.
    pub fn create_package(&mut self, name: &str) -> Result<(), PackageError> {
        if self.packages.contains_key(name) {
            return Err(PackageError::AlreadyMounted {
                name: name.to_string(),
            });
        }
        self.packages.insert(name.to_string(), Package::empty(name));
        log::debug!("package '{name}': created");
        Ok(())
    }

    /// Export `object` from `package` under `object_name`.
    ///
    /// The object's class must be registered in the linker's context.
    pub fn add_export(
        &mut self,
        package: &str,
        object_name: &str,
        object: ObjectPtr,
    ) -> Result<PackageIndex, PackageError> {
        let class_name = object.type_name();
        self.context.registry().require(class_name)?;
        let pkg = self.package_mut(package)?;
        if pkg.find_export(object_name).is_some() {
            return Err(PackageError::DuplicateExport {
                package: package.to_string(),
                object_name: object_name.to_string(),
            });
        }
        let index = export_index(package, pkg.exports.len())?;
        object.insert_flags(ObjectFlags::PUBLIC);
        pkg.exports.push(Export {
            object_name: object_name.to_string(),
            class_name: class_name.to_string(),
            offset: 0,
            size: 0,
            state: ExportState::Loaded(object),
        });
        Ok(index)
    }

    /// Parse `bytes` as package `name` and mount it. No export is loaded.
    pub fn mount_package(&mut self, name: &str, bytes: impl Into<Arc<[u8]>>) -> Result<(), PackageError> {
        if self.packages.contains_key(name) {
            return Err(PackageError::AlreadyMounted {
                name: name.to_string(),
            });
        }
        let data: Arc<[u8]> = bytes.into();
        let tables = read_tables(&mut MemoryReader::new(&*data))?;
        let exports = tables
            .exports
            .into_iter()
            .map(|entry| Export {
                object_name: entry.object_name,
                class_name: entry.class_name,
                offset: entry.offset,
                size: entry.size,
                state: ExportState::Unloaded,
            })
            .collect::<Vec<_>>();
        log::info!(
            "package '{name}': mounted {} bytes ({} imports, {} exports)",
            data.len(),
            tables.imports.len(),
            exports.len()
        );
        self.packages.insert(
            name.to_string(),
            Package {
                name: name.to_string(),
                data,
                imports: tables.imports,
                exports,
            },
        );
        Ok(())
    }

    /// Forget package `name`. Objects loaded from it stay alive while
    /// anything else holds them. Returns whether it was mounted.
    pub fn unmount_package(&mut self, name: &str) -> bool {
        let removed = self.packages.shift_remove(name).is_some();
        if removed {
            log::debug!("package '{name}': unmounted");
        }
        removed
    }

    /// Load export `object_name` of `package`, mounting the package from a
    /// source first if needed. Returns the already loaded object on repeat
    /// calls.
    pub fn load_object(&mut self, package: &str, object_name: &str) -> Result<ObjectPtr, PackageError> {
        self.ensure_mounted(package)?;
        let index = self
            .package_mut(package)?
            .find_export(object_name)
            .ok_or_else(|| PackageError::UnknownExport {
                package: package.to_string(),
                object_name: object_name.to_string(),
            })?;
        self.load_export(package, index)
    }

    /// Export `object_name` of mounted `package` if its object has been
    /// constructed. Never mounts or loads anything.
    pub fn find_object(&self, package: &str, object_name: &str) -> Option<ObjectPtr> {
        let pkg = self.packages.get(package)?;
        let index = pkg.find_export(object_name)?;
        pkg.exports[index].state.object().cloned()
    }

    /// Package and export name of the first mounted package exporting
    /// `object`.
    pub fn object_path(&self, object: &ObjectPtr) -> Option<(&str, &str)> {
        self.packages.values().find_map(|p| {
            p.exports
                .iter()
                .find(|e| e.state.object() == Some(object))
                .map(|e| (p.name.as_str(), e.object_name.as_str()))
        })
    }

    /// Load every export of `package` and return them in export order.
    pub fn fully_load(&mut self, package: &str) -> Result<Vec<ObjectPtr>, PackageError> {
        self.ensure_mounted(package)?;
        let count = self.package_mut(package)?.exports.len();
        (0..count).map(|i| self.load_export(package, i)).collect()
    }

    /// Object named by `index` inside `package`: `None` for the null index,
    /// an export of `package`, or an import loaded from its own package.
    pub fn resolve_index(&mut self, package: &str, index: PackageIndex) -> Result<Option<ObjectPtr>, PackageError> {
        if index.is_null() {
            return Ok(None);
        }
        self.ensure_mounted(package)?;
        let out_of_range = || PackageError::IndexOutOfRange {
            package: package.to_string(),
            index,
        };

        if let Some(i) = index.export_index() {
            if i >= self.package_mut(package)?.exports.len() {
                return Err(out_of_range());
            }
            return self.load_export(package, i).map(Some);
        }

        let i = index
            .import_index()
            .expect("non-null index is an export or an import");
        let import = self
            .package_mut(package)?
            .imports
            .get(i)
            .cloned()
            .ok_or_else(out_of_range)?;
        let object = self.load_object(&import.package, &import.object_name)?;
        let registry = self.context.registry();
        if !registry.is_child_of(object.type_name(), &import.class_name) {
            log::warn!(
                "package '{package}': import {}.{} is a '{}', expected '{}'",
                import.package,
                import.object_name,
                object.type_name(),
                import.class_name
            );
        }
        Ok(Some(object))
    }

    /// Serialize every export of `package` into package bytes.
    ///
    /// Unloaded exports are loaded first. References to objects exported by
    /// other mounted packages become imports; references to `TRANSIENT`
    /// objects and to objects no mounted package exports are written as
    /// null.
    pub fn save_package(&mut self, package: &str) -> Result<Vec<u8>, PackageError> {
        let objects = self.fully_load(package)?;
        let pkg = self.package_mut(package)?;
        let names: Vec<(String, String)> = pkg
            .exports
            .iter()
            .map(|e| (e.object_name.clone(), e.class_name.clone()))
            .collect();

        let mut indices: HashMap<ObjectHandle, PackageIndex> = HashMap::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            indices.insert(object.handle(), export_index(package, i)?);
        }
        let mut imports = Vec::new();
        let mut transient = HashSet::new();
        for object in &objects {
            let mut collector = ReferenceCollector::new();
            self.context.serialize_object(object, &mut collector)?;
            for reference in collector.into_references() {
                if indices.contains_key(&reference.handle()) || transient.contains(&reference.handle()) {
                    continue;
                }
                if reference.has_flags(ObjectFlags::TRANSIENT) {
                    log::debug!(
                        "package '{package}': {} '{}' is transient, saving it as null",
                        reference.handle(),
                        reference.type_name()
                    );
                    transient.insert(reference.handle());
                    continue;
                }
                match self.exporter_of(package, &reference) {
                    Some((owner, object_name)) => {
                        let index = import_index(package, imports.len())?;
                        imports.push(ImportEntry {
                            package: owner,
                            object_name,
                            class_name: reference.type_name().to_string(),
                        });
                        indices.insert(reference.handle(), index);
                    }
                    None => {
                        log::warn!(
                            "package '{package}': {} '{}' is not exported by any mounted package, saving it as null",
                            reference.handle(),
                            reference.type_name()
                        );
                        transient.insert(reference.handle());
                    }
                }
            }
        }

        let mut writer = MemoryWriter::new();
        let mut header = PackageHeader::current();
        header.serialize(&mut writer);

        let mut resolver = SaveResolver { indices };
        let mut exports = Vec::with_capacity(objects.len());
        for (object, (object_name, class_name)) in objects.iter().zip(names) {
            let offset = writer.tell();
            self.context
                .serialize_object(object, &mut PackageIndexArchive::new(&mut writer, &mut resolver))?;
            exports.push(ExportEntry {
                object_name,
                class_name,
                offset,
                size: writer.tell() - offset,
            });
        }

        header.import_count = table_len(package, imports.len(), "import")?;
        header.import_table_offset = writer.tell();
        for import in &mut imports {
            import.serialize(&mut writer);
        }
        header.export_count = table_len(package, exports.len(), "export")?;
        header.export_table_offset = writer.tell();
        for export in &mut exports {
            export.serialize(&mut writer);
        }
        writer.seek(0);
        header.serialize(&mut writer);
        archive_result(&writer)?;

        let bytes = writer.into_inner();
        log::info!(
            "package '{package}': saved {} exports, {} imports, {} bytes",
            exports.len(),
            imports.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn package_mut(&mut self, name: &str) -> Result<&mut Package, PackageError> {
        self.packages
            .get_mut(name)
            .ok_or_else(|| PackageError::UnknownPackage {
                name: name.to_string(),
            })
    }

    fn ensure_mounted(&mut self, name: &str) -> Result<(), PackageError> {
        if self.packages.contains_key(name) {
            return Ok(());
        }
        let mut found = None;
        for source in &self.sources {
            if let Some(bytes) = source.read_package(name)? {
                found = Some(bytes);
                break;
            }
        }
        match found {
            Some(bytes) => self.mount_package(name, bytes),
            None => Err(PackageError::UnknownPackage {
                name: name.to_string(),
            }),
        }
    }

    /// Package and export name under which another package exports
    /// `object`.
    fn exporter_of(&self, except: &str, object: &ObjectPtr) -> Option<(String, String)> {
        self.packages
            .values()
            .filter(|p| p.name != except)
            .find_map(|p| {
                p.exports
                    .iter()
                    .find(|e| e.state.object() == Some(object))
                    .map(|e| (p.name.clone(), e.object_name.clone()))
            })
    }

    /// Clear references to `failed` from every loaded export.
    ///
    /// Exports still in [`ExportState::Loading`] are further up the call
    /// stack and hold their own write lock. They asked for `failed` through
    /// the resolver, which hands them `None`.
    fn detach(&self, failed: &ObjectPtr) {
        let mut cleared = 0;
        let holders = self
            .packages
            .values()
            .flat_map(|p| &p.exports)
            .filter_map(|e| match &e.state {
                ExportState::Loaded(object) => Some(object),
                _ => None,
            })
            .filter(|object| *object != failed);
        for holder in holders {
            let mut replacer = ReferenceReplacer::new(failed.handle(), None);
            match self.context.serialize_object(holder, &mut replacer) {
                Ok(_) => cleared += replacer.replaced(),
                Err(e) => log::debug!("detach: skipped {}: {e}", holder.handle()),
            }
        }
        if cleared > 0 {
            log::warn!(
                "cleared {cleared} references to half-loaded {} '{}'",
                failed.handle(),
                failed.type_name()
            );
        }
    }

    fn load_export(&mut self, package: &str, index: usize) -> Result<ObjectPtr, PackageError> {
        let context = self.context.clone();
        let pkg = self.package_mut(package)?;
        let data = Arc::clone(&pkg.data);
        let export = pkg
            .exports
            .get_mut(index)
            .ok_or_else(|| PackageError::IndexOutOfRange {
                package: package.to_string(),
                index: PackageIndex::try_export(index).unwrap_or(PackageIndex::NULL),
            })?;
        if let Some(object) = export.state.object() {
            return Ok(object.clone());
        }
        let object_name = export.object_name.clone();
        // Payload bounds were checked against the data when mounting.
        let start = export.offset as usize;
        let end = start + export.size as usize;

        let object = context.construct(&export.class_name)?;
        object.insert_flags(ObjectFlags::PUBLIC | ObjectFlags::NEEDS_LOAD);
        export.state = ExportState::Loading(object.clone());

        let mut reader = MemoryReader::new(&data[start..end]);
        let result = {
            let mut resolver = LoadResolver {
                linker: &mut *self,
                package,
            };
            context.serialize_object(&object, &mut PackageIndexArchive::new(&mut reader, &mut resolver))
        };
        let consumed = reader.tell();

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                self.package_mut(package)?.exports[index].state = ExportState::Unloaded;
                log::error!("package '{package}': loading '{object_name}' failed: {e}");
                self.detach(&object);
                return Err(e.into());
            }
        };
        let export = &mut self.package_mut(package)?.exports[index];
        if consumed != export.size {
            log::warn!(
                "package '{package}': '{object_name}' read {consumed} of {} payload bytes",
                export.size
            );
        }
        if let Some(mut guard) = object.try_write() {
            guard.post_load();
        }
        object.remove_flags(ObjectFlags::NEEDS_LOAD);
        object.insert_flags(ObjectFlags::WAS_LOADED);
        export.state = ExportState::Loaded(object.clone());
        log::debug!(
            "package '{package}': loaded '{object_name}' ({} properties, {} skipped)",
            report.serialized.len(),
            report.skipped.len()
        );
        Ok(object)
    }
}

fn table_full(package: &str, table: &'static str) -> PackageError {
    PackageError::TableFull {
        package: package.to_string(),
        table,
    }
}

fn table_len(package: &str, len: usize, table: &'static str) -> Result<u32, PackageError> {
    u32::try_from(len).map_err(|_| table_full(package, table))
}

fn export_index(package: &str, position: usize) -> Result<PackageIndex, PackageError> {
    PackageIndex::try_export(position).ok_or_else(|| table_full(package, "export"))
}

fn import_index(package: &str, position: usize) -> Result<PackageIndex, PackageError> {
    PackageIndex::try_import(position).ok_or_else(|| table_full(package, "import"))
}

/// Resolves indices read from a payload, loading exports and imports on
/// demand.
struct LoadResolver<'a> {
    linker: &'a mut PackageLinker,
    package: &'a str,
}

impl PackageResolver for LoadResolver<'_> {
    fn object_to_index(&mut self, _object: &ObjectPtr) -> PackageIndex {
        PackageIndex::NULL
    }

    fn index_to_object(&mut self, index: PackageIndex) -> Option<ObjectPtr> {
        match self.linker.resolve_index(self.package, index) {
            Ok(object) => object,
            Err(e) => {
                log::warn!("package '{}': cannot resolve {index}: {e}", self.package);
                None
            }
        }
    }
}

/// Maps objects to the indices assigned before writing.
struct SaveResolver {
    indices: HashMap<ObjectHandle, PackageIndex>,
}

impl PackageResolver for SaveResolver {
    fn object_to_index(&mut self, object: &ObjectPtr) -> PackageIndex {
        self.indices
            .get(&object.handle())
            .copied()
            .unwrap_or(PackageIndex::NULL)
    }

    fn index_to_object(&mut self, _index: PackageIndex) -> Option<ObjectPtr> {
        None
    }
}
