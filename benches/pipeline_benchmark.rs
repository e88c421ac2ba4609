use divan::black_box_drop;
use sightline::{
    BoundingBox, CentroidTracker, DecoderConfig, Detection, Model, PipelineBuilder,
    PipelineConfig, RGB, Result, Tensor, TensorImage, Tracker,
};

/// Replays one channels-first output of `objects` well separated boxes that
/// drift right by one pixel per frame.
struct DriftModel {
    input_shape: [usize; 4],
    output_shape: [usize; 3],
    objects: usize,
    frame: usize,
}

impl DriftModel {
    fn new(objects: usize) -> Self {
        Self {
            input_shape: [1, 640, 640, 3],
            output_shape: [1, 84, 8400],
            objects,
            frame: 0,
        }
    }
}

impl Model for DriftModel {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn execute(&mut self, _input: &Tensor<f32>) -> Result<Tensor<f32>> {
        let candidates = self.output_shape[2];
        let mut out = vec![0.0_f32; 84 * candidates];
        let shift = (self.frame % 20) as f32;
        for i in 0..self.objects {
            out[i] = 20.0 + 60.0 * (i % 10) as f32 + shift;
            out[candidates + i] = 20.0 + 60.0 * (i / 10) as f32;
            out[2 * candidates + i] = 30.0;
            out[3 * candidates + i] = 30.0;
            out[(4 + i % 80) * candidates + i] = 0.9;
        }
        self.frame += 1;
        Ok(Tensor::from_vec(out, &self.output_shape, None)?)
    }
}

#[divan::bench(args = [1, 20, 100])]
fn pipeline_process(bencher: divan::Bencher, objects: usize) {
    let config = PipelineConfig::new(DecoderConfig::yolov8(80, 8400));
    let mut pipeline = PipelineBuilder::new(DriftModel::new(objects))
        .with_config(config)
        .build()
        .unwrap();
    let frame = TensorImage::new(1280, 720, RGB).unwrap();
    let mut ts = 0;

    bencher.bench_local(|| {
        ts += 1;
        black_box_drop(pipeline.process(&frame, ts).unwrap())
    });
}

#[divan::bench(args = [10, 100, 500])]
fn tracker_update(bencher: divan::Bencher, objects: usize) {
    let frames = (0..20)
        .map(|f| {
            (0..objects)
                .map(|i| Detection {
                    bbox: BoundingBox::new(
                        40.0 * (i % 25) as f32 + f as f32,
                        40.0 * (i / 25) as f32,
                        20.0,
                        20.0,
                    ),
                    class_id: i % 3,
                    class_name: format!("class_{}", i % 3),
                    confidence: 0.8,
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    bencher
        .with_inputs(CentroidTracker::new)
        .bench_local_values(|mut tracker| {
            for (ts, frame) in frames.iter().enumerate() {
                black_box_drop(tracker.update(frame.as_slice(), ts as u64));
            }
        });
}

fn main() {
    divan::main();
}
