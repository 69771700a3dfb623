fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use capybeam_protocol::{Envelope, FileMeta, Kind};
    use capybeam_transfer::{checksum_text, decode_wire_form, encode_wire_form};

    // Golden vectors for the documented 2-chunk exchange: the file bytes
    // 0x00..0x07 split at 4 bytes per chunk. Existing peers hard-code these
    // strings; a mismatch here is a wire break, not a test to update.
    const CHUNK_1_WIRE: &str = "AAECAw==";
    const CHUNK_2_WIRE: &str = "BAUGBw==";
    const CHUNK_1_DIGEST: &str = "25464e8d1c31533cfab75eae73087189c62ca36a4d974af2eb828d5c0c8356d7";
    const CHUNK_2_DIGEST: &str = "ff4e59059c4c1c65f6cc33a43b44fb91c18bcafa0f2777efb0843091c47113d5";

    #[test]
    fn kind_ids_are_frozen() {
        assert_eq!(Kind::MetaInfo.id(), 0);
        assert_eq!(Kind::MetaInfoReceived.id(), 1);
        assert_eq!(Kind::OkNext.id(), 2);
        assert_eq!(Kind::EvalSha256.id(), 3);
        assert_eq!(Kind::InvalidSha256.id(), 4);
        assert_eq!(Kind::Completed.id(), 50);
        assert_eq!(Kind::Unknown.id(), 100);
    }

    #[test]
    fn envelope_json_shape() {
        let payload = Envelope::new(Kind::OkNext, CHUNK_1_WIRE, 7).encode().unwrap();
        assert_eq!(payload, r#"{"kind_id":2,"body":"AAECAw==","nonce":7}"#);

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("kind_id"));
        assert!(object.contains_key("body"));
        assert!(object.contains_key("nonce"));
    }

    #[test]
    fn metadata_json_shape() {
        let meta = FileMeta::new("notes.txt", Some("text/plain".into()), 8, 4).unwrap();
        let json = meta.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"fileName":"notes.txt","fileType":"text/plain","fileSize":8,"fileChunks":2,"chunkSize":4}"#
        );
    }

    #[test]
    fn chunk_wire_forms_and_digests() {
        assert_eq!(encode_wire_form(&[0x00, 0x01, 0x02, 0x03]), CHUNK_1_WIRE);
        assert_eq!(encode_wire_form(&[0x04, 0x05, 0x06, 0x07]), CHUNK_2_WIRE);
        assert_eq!(checksum_text(CHUNK_1_WIRE), CHUNK_1_DIGEST);
        assert_eq!(checksum_text(CHUNK_2_WIRE), CHUNK_2_DIGEST);
    }

    #[test]
    fn digest_covers_the_encoded_text() {
        // The whole-file wire form hashes differently from either chunk:
        // digests are per chunk and taken over the Base64 text.
        let whole = encode_wire_form(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(whole, "AAECAwQFBgc=");
        assert_eq!(
            checksum_text(&whole),
            "3815e09d69f6368b350ead7ab05c1e4da921d9f303ca5203ae0386c2354df370"
        );
    }

    #[test]
    fn wire_form_decodes_back_to_raw_bytes() {
        assert_eq!(decode_wire_form(CHUNK_1_WIRE).unwrap(), [0, 1, 2, 3]);
        assert_eq!(decode_wire_form(CHUNK_2_WIRE).unwrap(), [4, 5, 6, 7]);
        // Short final chunk: padding carries the exact raw length.
        assert_eq!(decode_wire_form("Kg==").unwrap(), [0x2a]);
    }

    #[test]
    fn foreign_peer_frames_parse() {
        // Frames as another implementation would emit them, whitespace and
        // field order included.
        let meta_frame = r#"{ "kind_id": 0, "nonce": 1, "body": "{\"fileName\":\"a.bin\",\"fileType\":\"application/octet-stream\",\"fileSize\":4,\"fileChunks\":1,\"chunkSize\":4}" }"#;
        let envelope = Envelope::decode(meta_frame);
        assert_eq!(envelope.kind, Kind::MetaInfo);
        let meta = FileMeta::from_json(&envelope.body).unwrap();
        assert_eq!(meta.chunk_count, 1);

        let report = Envelope::decode(&format!(
            r#"{{"body":" {CHUNK_1_DIGEST} ","kind_id":3,"nonce":9}}"#
        ));
        assert_eq!(report.kind, Kind::EvalSha256);
        assert_eq!(report.body, CHUNK_1_DIGEST);
    }

    mod full_exchange {
        use std::io::Cursor;
        use std::sync::{Arc, Mutex};

        use capybeam_session::{
            ChannelError, FileSink, ReceiverSession, ReceiverState, SenderSession, VisualChannel,
        };
        use capybeam_transfer::DeliveredFile;

        use super::*;

        #[derive(Clone, Default)]
        struct FrameLog(Arc<Mutex<Vec<Envelope>>>);

        impl FrameLog {
            fn last(&self) -> Envelope {
                self.0.lock().unwrap().last().cloned().unwrap()
            }
        }

        impl VisualChannel for FrameLog {
            fn display(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
                self.0.lock().unwrap().push(envelope.clone());
                Ok(())
            }

            fn close(&mut self) {}
        }

        #[derive(Clone, Default)]
        struct MemorySink(Arc<Mutex<Option<DeliveredFile>>>);

        impl FileSink for MemorySink {
            fn deliver(&mut self, file: DeliveredFile) -> std::io::Result<()> {
                *self.0.lock().unwrap() = Some(file);
                Ok(())
            }
        }

        /// The documented frame-by-frame sequence, digests included.
        #[test]
        fn two_chunk_exchange_golden_sequence() {
            let data: Vec<u8> = (0u8..8).collect();
            let meta = FileMeta::new("golden.bin", None, 8, 4).unwrap();

            let sender_log = FrameLog::default();
            let mut sender =
                SenderSession::new(Cursor::new(data.clone()), meta, sender_log.clone());
            let receiver_log = FrameLog::default();
            let sink = MemorySink::default();
            let mut receiver = ReceiverSession::new(receiver_log.clone(), sink.clone());

            sender.start().unwrap();
            receiver.start().unwrap();
            assert_eq!(sender_log.last().kind, Kind::MetaInfo);

            receiver.observe(&sender_log.last()).unwrap();
            assert_eq!(receiver_log.last().kind, Kind::MetaInfoReceived);

            sender.observe(&receiver_log.last()).unwrap();
            assert_eq!(sender_log.last().body, CHUNK_1_WIRE);

            receiver.observe(&sender_log.last()).unwrap();
            assert_eq!(receiver_log.last().body, CHUNK_1_DIGEST);

            sender.observe(&receiver_log.last()).unwrap();
            assert_eq!(sender_log.last().body, CHUNK_2_WIRE);

            receiver.observe(&sender_log.last()).unwrap();
            assert_eq!(receiver_log.last().body, CHUNK_2_DIGEST);

            sender.observe(&receiver_log.last()).unwrap();
            assert_eq!(sender_log.last().kind, Kind::Completed);

            receiver.observe(&sender_log.last()).unwrap();
            assert_eq!(receiver.state(), ReceiverState::Finalized);
            assert_eq!(sink.0.lock().unwrap().take().unwrap().bytes, data);
        }
    }
}
