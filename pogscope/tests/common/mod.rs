//! Shared builders for synthesizing package containers in tests.
//!
//! `OpStream` assembles an opcode stream with label-based jump fixups so tests never
//! hardcode byte offsets; `PackageBuilder` wraps streams, exports, imports, and the
//! string table into a well-formed `FORM` container.

#![allow(dead_code)]

/// A forward-referencable position in an [`OpStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Default)]
pub struct OpStream {
    bytes: Vec<u8>,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
    import_sites: Vec<(String, u32)>,
}

impl OpStream {
    pub fn new() -> Self {
        OpStream::default()
    }

    /// Current offset in the stream.
    pub fn offset(&self) -> u32 {
        u32::try_from(self.bytes.len()).unwrap()
    }

    /// Allocate an unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset.
    pub fn place(&mut self, label: Label) {
        self.labels[label.0] = Some(self.offset());
    }

    /// Allocate a label bound to the current offset.
    pub fn here(&mut self) -> Label {
        let label = self.label();
        self.place(label);
        label
    }

    fn emit_label(&mut self, label: Label) {
        self.fixups.push((self.bytes.len(), label));
        self.bytes.extend_from_slice(&[0u8; 4]);
    }

    pub fn pop_stack(&mut self) -> &mut Self {
        self.bytes.push(0x01);
        self
    }

    pub fn clone_stack(&mut self) -> &mut Self {
        self.bytes.push(0x03);
        self
    }

    pub fn literal_zero(&mut self) -> &mut Self {
        self.bytes.push(0x04);
        self
    }

    pub fn literal_one(&mut self) -> &mut Self {
        self.bytes.push(0x05);
        self
    }

    pub fn literal_byte(&mut self, value: i8) -> &mut Self {
        self.bytes.push(0x06);
        self.bytes.push(value as u8);
        self
    }

    pub fn literal_int(&mut self, value: i32) -> &mut Self {
        self.bytes.push(0x08);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn literal_float(&mut self, value: f32) -> &mut Self {
        self.bytes.push(0x0B);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn literal_string(&mut self, index: u32) -> &mut Self {
        self.bytes.push(0x3E);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        self
    }

    pub fn variable_read(&mut self, index: u32) -> &mut Self {
        self.bytes.push(0x0C);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        self
    }

    pub fn variable_write(&mut self, index: u32) -> &mut Self {
        self.bytes.push(0x0D);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        self
    }

    pub fn push_stack_n(&mut self, count: u32) -> &mut Self {
        self.bytes.push(0x0E);
        self.bytes.extend_from_slice(&count.to_le_bytes());
        self
    }

    pub fn jump(&mut self, target: Label) -> &mut Self {
        self.bytes.push(0x0F);
        self.emit_label(target);
        self
    }

    pub fn jump_if_false(&mut self, target: Label) -> &mut Self {
        self.bytes.push(0x10);
        self.emit_label(target);
        self
    }

    pub fn jump_if_true(&mut self, target: Label) -> &mut Self {
        self.bytes.push(0x11);
        self.emit_label(target);
        self
    }

    pub fn jump_if_not_debug(&mut self, target: Label) -> &mut Self {
        self.bytes.push(0x45);
        self.emit_label(target);
        self
    }

    pub fn function_end(&mut self) -> &mut Self {
        self.bytes.push(0x13);
        self
    }

    /// A call into this package's own code section.
    pub fn call_local(&mut self, target: Label, parameter_count: u32) -> &mut Self {
        self.bytes.push(0x14);
        self.bytes.extend_from_slice(&[0u8; 4]);
        self.emit_label(target);
        self.bytes.extend_from_slice(&parameter_count.to_le_bytes());
        self
    }

    /// A call into an imported package; the site is recorded for the `FIMP` section.
    pub fn call_imported(&mut self, function: &str, parameter_count: u32) -> &mut Self {
        self.import_sites
            .push((function.to_string(), self.offset()));
        self.bytes.push(0x15);
        self.bytes.extend_from_slice(&[0u8; 8]);
        self.bytes.extend_from_slice(&parameter_count.to_le_bytes());
        self
    }

    pub fn int_add(&mut self) -> &mut Self {
        self.bytes.push(0x1A);
        self
    }

    pub fn equals(&mut self) -> &mut Self {
        self.bytes.push(0x20);
        self
    }

    pub fn int_lt(&mut self) -> &mut Self {
        self.bytes.push(0x23);
        self
    }

    pub fn logical_not(&mut self) -> &mut Self {
        self.bytes.push(0x32);
        self
    }

    pub fn unknown_3b(&mut self) -> &mut Self {
        self.bytes.push(0x3B);
        self
    }

    pub fn unknown_3c(&mut self) -> &mut Self {
        self.bytes.push(0x3C);
        self
    }

    pub fn schedule_start(&mut self) -> &mut Self {
        self.bytes.push(0x41);
        self
    }

    pub fn schedule_every(&mut self, skip: Label, interval: f32) -> &mut Self {
        self.bytes.push(0x42);
        self.emit_label(skip);
        self.bytes.extend_from_slice(&[0u8; 4]);
        self.bytes.extend_from_slice(&interval.to_le_bytes());
        self
    }

    pub fn atomic_start(&mut self) -> &mut Self {
        self.bytes.push(0x43);
        self
    }

    pub fn atomic_stop(&mut self) -> &mut Self {
        self.bytes.push(0x44);
        self
    }

    /// The `LITERAL_ZERO; UNKNOWN_3C; FUNCTION_END` tail of a void function. Returns
    /// the offset return jumps should target.
    pub fn void_epilogue(&mut self) -> Label {
        let end = self.here();
        self.literal_zero();
        self.unknown_3c();
        self.function_end();
        end
    }

    /// Resolve fixups and return the raw stream plus recorded import call sites.
    pub fn finish(mut self) -> (Vec<u8>, Vec<(String, u32)>) {
        for (position, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].expect("unbound label");
            self.bytes[position..position + 4].copy_from_slice(&target.to_le_bytes());
        }
        (self.bytes, self.import_sites)
    }
}

#[derive(Default)]
pub struct PackageBuilder {
    sections: Vec<([u8; 4], Vec<u8>)>,
}

fn nul_terminated(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

impl PackageBuilder {
    pub fn new() -> Self {
        PackageBuilder::default()
    }

    /// `PKHD`: the exporting package.
    pub fn header(mut self, name: &str) -> Self {
        self.sections.push((*b"PKHD", nul_terminated(name)));
        self
    }

    /// `PIMP`: one imported package.
    pub fn import(mut self, name: &str) -> Self {
        self.sections.push((*b"PIMP", nul_terminated(name)));
        self
    }

    /// `FIMP`: call sites of one imported function (use after its `import`).
    pub fn function_import(mut self, name: &str, offsets: &[u32]) -> Self {
        let mut payload = nul_terminated(name);
        payload.extend_from_slice(&u32::try_from(offsets.len()).unwrap().to_be_bytes());
        for offset in offsets {
            payload.extend_from_slice(&offset.to_be_bytes());
        }
        self.sections.push((*b"FIMP", payload));
        self
    }

    /// `FEXP`: one exported function entry.
    pub fn export(mut self, name: &str, offset: u32) -> Self {
        let mut payload = nul_terminated(name);
        payload.extend_from_slice(&offset.to_be_bytes());
        self.sections.push((*b"FEXP", payload));
        self
    }

    /// `STAB`: the string table.
    pub fn strings(mut self, strings: &[&str]) -> Self {
        let mut payload = u32::try_from(strings.len()).unwrap().to_be_bytes().to_vec();
        for string in strings {
            payload.extend_from_slice(&nul_terminated(string));
        }
        self.sections.push((*b"STAB", payload));
        self
    }

    /// `CODE`: the opcode stream.
    pub fn code(mut self, stream: &[u8]) -> Self {
        let mut payload = u32::try_from(stream.len()).unwrap().to_be_bytes().to_vec();
        payload.extend_from_slice(stream);
        self.sections.push((*b"CODE", payload));
        self
    }

    /// Frame everything in the outer `FORM` wrapper.
    pub fn build(self) -> Vec<u8> {
        let mut body = b"PKG ".to_vec();
        for (tag, payload) in &self.sections {
            body.extend_from_slice(tag);
            body.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
            body.extend_from_slice(payload);
            if payload.len() % 2 == 1 {
                body.push(0);
            }
        }

        let mut container = b"FORM".to_vec();
        container.extend_from_slice(&u32::try_from(body.len()).unwrap().to_be_bytes());
        container.extend_from_slice(&body);
        container
    }
}
