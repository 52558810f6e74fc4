//! 3MF package generation with per-object materials.
//!
//! Besides the core model part, the package carries Bambu's
//! `Metadata/model_settings.config` so each object lands on its own
//! extruder (AMS slot) when the file is opened in Bambu Studio.

use std::io::{Cursor, Write};

use qrslab_geometry::MaterialGroup;
use qrslab_mesh::TriangleMesh;
use quick_xml::escape::escape;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipWriter};

use crate::error::Result;
use crate::{ExportOptions, MaterialSpec};

/// Resource id of the material group.
const MATERIALS_ID: u32 = 1;

/// One model object of the package.
struct PackageObject<'a> {
    id: u32,
    name: &'static str,
    material_index: u32,
    extruder: u32,
    mesh: TriangleMesh,
    material: &'a MaterialSpec,
}

/// 3MF package holding the base and accent groups.
pub struct ThreeMfPackage<'a> {
    objects: Vec<PackageObject<'a>>,
    application: &'a str,
}

impl<'a> ThreeMfPackage<'a> {
    /// Package the two material groups, base first.
    pub fn new(base: &MaterialGroup, accent: &MaterialGroup, options: &'a ExportOptions) -> Self {
        let objects = [
            (base, &options.base_material),
            (accent, &options.accent_material),
        ]
        .into_iter()
        .enumerate()
        .map(|(k, (group, material))| PackageObject {
            id: MATERIALS_ID + 1 + k as u32,
            name: group.material.name(),
            material_index: k as u32,
            extruder: k as u32 + 1,
            mesh: group.mesh(),
            material,
        })
        .collect();
        Self {
            objects,
            application: &options.application,
        }
    }

    /// Generate the 3MF file as bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(6))
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let entries = [
            ("[Content_Types].xml", content_types_xml()),
            ("_rels/.rels", rels_xml()),
            ("3D/3dmodel.model", self.model_xml()),
            ("Metadata/model_settings.config", self.model_settings_xml()),
        ];
        for (name, body) in entries {
            zip.start_file(name, options)?;
            zip.write_all(body.as_bytes())?;
        }
        zip.finish()?;

        Ok(buffer.into_inner())
    }

    fn model_xml(&self) -> String {
        let mut materials_xml = String::new();
        let mut objects_xml = String::new();
        let mut items_xml = String::new();

        for object in &self.objects {
            materials_xml.push_str(&format!(
                "      <m:base name=\"{}\" displaycolor=\"{}\"/>\n",
                escape(object.material.name.as_str()),
                escape(object.material.display_color.as_str())
            ));

            objects_xml.push_str(&format!(
                "    <object id=\"{}\" name=\"{}\" type=\"model\" pid=\"{MATERIALS_ID}\" pindex=\"{}\" p:UUID=\"{}\">\n      <mesh>\n        <vertices>\n",
                object.id,
                object.name,
                object.material_index,
                stable_uuid(&format!("object/{}", object.name))
            ));
            for v in object.mesh.vertices.chunks_exact(3) {
                objects_xml.push_str(&format!(
                    "          <vertex x=\"{:.6}\" y=\"{:.6}\" z=\"{:.6}\"/>\n",
                    v[0], v[1], v[2]
                ));
            }
            objects_xml.push_str("        </vertices>\n        <triangles>\n");
            for t in object.mesh.triangles() {
                objects_xml.push_str(&format!(
                    "          <triangle v1=\"{}\" v2=\"{}\" v3=\"{}\"/>\n",
                    t[0], t[1], t[2]
                ));
            }
            objects_xml.push_str("        </triangles>\n      </mesh>\n    </object>\n");

            items_xml.push_str(&format!(
                "    <item objectid=\"{}\" transform=\"1 0 0 0 1 0 0 0 1 0 0 0\" p:UUID=\"{}\"/>\n",
                object.id,
                stable_uuid(&format!("item/{}", object.name))
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:m="http://schemas.microsoft.com/3dmanufacturing/material/2015/02" xmlns:p="http://schemas.microsoft.com/3dmanufacturing/production/2015/06" requiredextensions="p">
  <metadata name="Application">{}</metadata>
  <resources>
    <m:basematerials id="{MATERIALS_ID}">
{materials_xml}    </m:basematerials>
{objects_xml}  </resources>
  <build p:UUID="{}">
{items_xml}  </build>
</model>
"#,
            escape(self.application),
            stable_uuid("build")
        )
    }

    fn model_settings_xml(&self) -> String {
        let mut objects_xml = String::new();
        for object in &self.objects {
            objects_xml.push_str(&format!(
                r#"  <object id="{id}">
    <metadata key="name" value="{name}"/>
    <metadata key="extruder" value="{extruder}"/>
    <part id="1" subtype="normal_part">
      <metadata key="name" value="{name}"/>
      <metadata key="extruder" value="{extruder}"/>
    </part>
  </object>
"#,
                id = object.id,
                name = object.name,
                extruder = object.extruder
            ));
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<config>\n{objects_xml}</config>\n"
        )
    }
}

fn content_types_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
  <Default Extension="config" ContentType="text/xml"/>
</Types>
"#
    .to_string()
}

fn rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel-1" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>
"#
    .to_string()
}

/// Name-based UUID, identical on every export.
fn stable_uuid(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("qrslab/{name}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrslab_geometry::{Material, Solid};
    use qrslab_mesh::HeightField;
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use std::io::Read;

    fn group(material: Material, x0: f64) -> MaterialGroup {
        let field = HeightField::cuboid(x0, 0.0, x0 + 1.0, 1.0, 0.0, 1.0).unwrap();
        MaterialGroup {
            material,
            solids: vec![Solid::from_field(material.name(), field).unwrap()],
        }
    }

    fn package_bytes(options: &ExportOptions) -> Vec<u8> {
        let (base, accent) = (group(Material::Base, 0.0), group(Material::Accent, 2.0));
        ThreeMfPackage::new(&base, &accent, options).to_bytes().unwrap()
    }

    fn entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_package_entries() {
        let bytes = package_bytes(&ExportOptions::default());
        assert_eq!(&bytes[0..2], b"PK");

        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<_> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "3D/3dmodel.model",
                "Metadata/model_settings.config",
                "[Content_Types].xml",
                "_rels/.rels",
            ]
        );
    }

    #[test]
    fn test_objects_and_materials() {
        let xml = entry(&package_bytes(&ExportOptions::default()), "3D/3dmodel.model");

        let mut reader = Reader::from_str(&xml);
        let mut objects = Vec::new();
        let mut uuids = Vec::new();
        let mut colors = Vec::new();
        let mut vertices = 0;
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"object" => {
                        let attr = |key: &str| {
                            e.try_get_attribute(key)
                                .unwrap()
                                .unwrap()
                                .unescape_value()
                                .unwrap()
                                .into_owned()
                        };
                        objects.push((attr("id"), attr("name"), attr("pindex")));
                        uuids.push(attr("p:UUID"));
                    }
                    b"item" | b"build" => {
                        let uuid = e.try_get_attribute("p:UUID").unwrap().unwrap();
                        uuids.push(uuid.unescape_value().unwrap().into_owned());
                    }
                    b"m:base" => {
                        let color = e.try_get_attribute("displaycolor").unwrap().unwrap();
                        colors.push(color.unescape_value().unwrap().into_owned());
                    }
                    b"vertex" => vertices += 1,
                    _ => {}
                },
                _ => {}
            }
        }

        assert_eq!(
            objects,
            [
                ("2".to_string(), "base".to_string(), "0".to_string()),
                ("3".to_string(), "accent".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(colors, ["#00AA00", "#FFFFFF"]);
        assert_eq!(vertices, 16);

        // Production extension: objects, items and the build all carry
        // distinct UUIDs.
        assert!(xml.contains(r#"requiredextensions="p""#));
        assert_eq!(uuids.len(), 5);
        for uuid in &uuids {
            assert!(Uuid::parse_str(uuid).is_ok(), "{uuid}");
        }
        let mut distinct = uuids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), uuids.len());
        assert!(xml.contains(r#"<vertex x="1.000000" y="0.000000" z="0.000000"/>"#));
    }

    #[test]
    fn test_extruder_assignment() {
        let config = entry(
            &package_bytes(&ExportOptions::default()),
            "Metadata/model_settings.config",
        );
        let base = config.find(r#"<object id="2">"#).unwrap();
        let accent = config.find(r#"<object id="3">"#).unwrap();
        assert!(base < accent);
        assert!(config[base..accent].contains(r#"key="extruder" value="1""#));
        assert!(config[accent..].contains(r#"key="extruder" value="2""#));
    }

    #[test]
    fn test_uuids_are_stable() {
        let a = package_bytes(&ExportOptions::default());
        let b = package_bytes(&ExportOptions::default());
        assert_eq!(a, b);

        let xml = entry(&a, "3D/3dmodel.model");
        assert!(xml.contains(&stable_uuid("object/base").to_string()));
        assert!(xml.contains(&stable_uuid("item/accent").to_string()));
        assert!(xml.contains(&stable_uuid("build").to_string()));
        assert_eq!(stable_uuid("build").get_version_num(), 5);
    }

    #[test]
    fn test_names_are_escaped() {
        let options = ExportOptions {
            base_material: MaterialSpec::new("Black & Gold", "#000000"),
            application: "<qrslab>".into(),
            ..ExportOptions::default()
        };
        let xml = entry(&package_bytes(&options), "3D/3dmodel.model");
        assert!(xml.contains("Black &amp; Gold"));
        assert!(xml.contains("&lt;qrslab&gt;"));
    }
}
