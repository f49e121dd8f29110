//! Host/GPU layout agreement checks
//!
//! The WGSL programs are parsed with naga and every uniform struct they
//! declare is compared field by field with the host record of the same name.
//! Vertex inputs of `vs_main` are checked against the vertex buffer layouts
//! the host binds. Any disagreement is a fatal setup error.

use crate::backend::types::VertexBufferLayout;
use crate::uniforms::UniformLayout;
use naga::{Binding, Module, TypeInner};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Failed to parse program '{program}': {message}")]
    Parse { program: String, message: String },
    #[error("Struct '{name}' not declared in program '{program}'")]
    MissingStruct { program: String, name: String },
    #[error("Struct '{name}' has {device} fields on the device but {host} on the host")]
    FieldCount {
        name: String,
        host: usize,
        device: usize,
    },
    #[error("Struct '{name}' field {index}: host has '{host}', device has '{device}'")]
    FieldName {
        name: String,
        index: usize,
        host: String,
        device: String,
    },
    #[error("Field '{name}.{field}' is at offset {device} on the device but {host} on the host")]
    FieldOffset {
        name: String,
        field: String,
        host: u32,
        device: u32,
    },
    #[error("Field '{name}.{field}' is {device} bytes on the device but {host} on the host")]
    FieldSize {
        name: String,
        field: String,
        host: u32,
        device: u32,
    },
    #[error("Struct '{name}' is {device} bytes on the device but {host} on the host")]
    StructSize { name: String, host: u32, device: u32 },
    #[error("Entry point '{entry}' not found in program '{program}'")]
    MissingEntryPoint { program: String, entry: String },
    #[error("Vertex input @location({location}) in '{program}' has no matching buffer attribute")]
    UnboundVertexInput { program: String, location: u32 },
    #[error("Vertex input @location({location}) in '{program}' is {device} bytes but the buffer provides {host}")]
    VertexInputSize {
        program: String,
        location: u32,
        host: u64,
        device: u32,
    },
}

/// A parsed WGSL program, ready for layout queries.
pub struct ProgramReflection {
    name: String,
    module: Module,
}

impl ProgramReflection {
    pub fn parse(name: &str, source: &str) -> Result<Self, LayoutError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| LayoutError::Parse {
            program: name.to_string(),
            message: e.emit_to_string(source),
        })?;
        Ok(Self {
            name: name.to_string(),
            module,
        })
    }

    /// Compare the struct named `T::WGSL_NAME` with the host record `T`.
    pub fn check_uniform<T: UniformLayout>(&self) -> Result<(), LayoutError> {
        let struct_name = T::WGSL_NAME;
        let (members, span) = self
            .module
            .types
            .iter()
            .find_map(|(_, ty)| match (&ty.name, &ty.inner) {
                (Some(name), TypeInner::Struct { members, span }) if name == struct_name => {
                    Some((members, *span))
                }
                _ => None,
            })
            .ok_or_else(|| LayoutError::MissingStruct {
                program: self.name.clone(),
                name: struct_name.to_string(),
            })?;

        let host = T::field_layouts();
        if host.len() != members.len() {
            return Err(LayoutError::FieldCount {
                name: struct_name.to_string(),
                host: host.len(),
                device: members.len(),
            });
        }

        let ctx = self.module.to_ctx();
        for (index, (field, member)) in host.iter().zip(members.iter()).enumerate() {
            let device_name = member.name.as_deref().unwrap_or("");
            if device_name != field.name {
                return Err(LayoutError::FieldName {
                    name: struct_name.to_string(),
                    index,
                    host: field.name.to_string(),
                    device: device_name.to_string(),
                });
            }
            if member.offset != field.offset {
                return Err(LayoutError::FieldOffset {
                    name: struct_name.to_string(),
                    field: field.name.to_string(),
                    host: field.offset,
                    device: member.offset,
                });
            }
            let device_size = self.module.types[member.ty].inner.size(ctx);
            if device_size != field.size {
                return Err(LayoutError::FieldSize {
                    name: struct_name.to_string(),
                    field: field.name.to_string(),
                    host: field.size,
                    device: device_size,
                });
            }
        }

        if span != T::byte_size() {
            return Err(LayoutError::StructSize {
                name: struct_name.to_string(),
                host: T::byte_size(),
                device: span,
            });
        }

        Ok(())
    }

    /// Check that every `@location` input of `vs_main` is fed by an attribute
    /// of the same width in one of `layouts`.
    pub fn check_vertex_inputs(&self, layouts: &[VertexBufferLayout]) -> Result<(), LayoutError> {
        let entry = self
            .module
            .entry_points
            .iter()
            .find(|ep| ep.name == "vs_main")
            .ok_or_else(|| LayoutError::MissingEntryPoint {
                program: self.name.clone(),
                entry: "vs_main".to_string(),
            })?;

        let ctx = self.module.to_ctx();
        let mut inputs = Vec::new();
        for argument in &entry.function.arguments {
            match &argument.binding {
                Some(Binding::Location { location, .. }) => {
                    inputs.push((*location, self.module.types[argument.ty].inner.size(ctx)));
                }
                Some(Binding::BuiltIn(_)) => {}
                None => {
                    if let TypeInner::Struct { members, .. } = &self.module.types[argument.ty].inner
                    {
                        for member in members {
                            if let Some(Binding::Location { location, .. }) = &member.binding {
                                inputs.push((*location, self.module.types[member.ty].inner.size(ctx)));
                            }
                        }
                    }
                }
            }
        }

        for (location, device_size) in inputs {
            let attribute = layouts
                .iter()
                .flat_map(|layout| layout.attributes.iter())
                .find(|attribute| attribute.location == location)
                .ok_or_else(|| LayoutError::UnboundVertexInput {
                    program: self.name.clone(),
                    location,
                })?;
            if attribute.format.size() != device_size as u64 {
                return Err(LayoutError::VertexInputSize {
                    program: self.name.clone(),
                    location,
                    host: attribute.format.size(),
                    device: device_size,
                });
            }
        }

        Ok(())
    }
}
