//! End-to-end capture flows through the public API only.

use framegrab::{
    CaptureError, CpuCapture, FragmentShader, Frame, GpuCapture, GpuOptions, Options,
    SharedSource, VideoCapture,
};

fn red_source(width: u32, height: u32) -> SharedSource {
    SharedSource::new(Frame::solid(width, height, [255, 0, 0, 255]))
}

#[test]
fn cpu_capture_full_lifecycle() {
    let source = red_source(2, 2);
    let mut capture = CpuCapture::new(source.clone(), Options::default()).unwrap();

    assert_eq!(capture.channels(), 4);
    assert_eq!(capture.size(), 16);

    capture.grab().unwrap();
    let mut buffer = vec![0; capture.size()];
    capture.retrieve(&mut buffer).unwrap();
    assert!(buffer.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));

    source.publish(Frame::solid(2, 2, [0, 0, 255, 255]));
    let next = capture.read().unwrap();
    assert!(next.chunks_exact(4).all(|p| p == [0, 0, 255, 255]));

    capture.release();
    assert!(matches!(capture.grab(), Err(CaptureError::Runtime(_))));
}

#[test]
fn gpu_capture_full_lifecycle() {
    let options = GpuOptions::default();
    let mut capture = match GpuCapture::new(red_source(2, 2), options) {
        Ok(capture) => capture,
        Err(CaptureError::ContextAcquisition(reason)) => {
            eprintln!("skipping gpu flow test, no adapter: {reason}");
            return;
        }
        Err(other) => panic!("gpu construction failed: {other}"),
    };

    let buffer = capture.read().unwrap();
    assert_eq!(buffer.len(), capture.size());
    assert!(buffer.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));

    capture.release();
    assert!(matches!(capture.grab(), Err(CaptureError::Runtime(_))));
}

#[test]
fn backends_interchange_behind_the_contract() {
    let mut captures: Vec<Box<dyn VideoCapture>> = vec![Box::new(
        CpuCapture::new(red_source(4, 4), Options::default()).unwrap(),
    )];
    let gpu_options = GpuOptions {
        shader: FragmentShader::Rgba,
        ..GpuOptions::default()
    };
    match GpuCapture::new(red_source(4, 4), gpu_options) {
        Ok(capture) => captures.push(Box::new(capture)),
        Err(CaptureError::ContextAcquisition(reason)) => {
            eprintln!("running contract test without a gpu backend: {reason}");
        }
        Err(other) => panic!("gpu construction failed: {other}"),
    }

    for capture in &mut captures {
        let buffer = capture.read().unwrap();
        assert_eq!(buffer.len(), 4 * 4 * 4);
        assert!(buffer.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
        capture.release();
    }
}
